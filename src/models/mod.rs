// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod contact;
pub mod credential;
pub mod user;

pub use contact::{Contact, ContentItem};
pub use credential::{Credential, StoredCredential};
pub use user::{Address, Identity, PhoneNumber, ProfileFacets, UserRecord};
