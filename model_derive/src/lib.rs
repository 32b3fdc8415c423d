//! Procedural macro for implementing the repository `Model` trait
//!
//! ```ignore
//! use repository::Model;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Clone, Default, Serialize, Deserialize, Model)]
//! #[model(table = "posts")]
//! pub struct Post {
//!     pub id: i64,
//!     pub author_id: i64,
//!     pub deleted_at: Option<String>,
//!
//!     #[serde(default, skip_serializing_if = "Option::is_none")]
//!     #[belongs_to]
//!     pub author: Option<Author>,
//!
//!     #[serde(default)]
//!     #[has_many(foreign = "post_id")]
//!     pub comments: Vec<Comment>,
//! }
//! ```
//!
//! Struct attribute `#[model(...)]`, every key optional:
//! - `table = "..."`: defaults to the snake_case plural of the struct name
//! - `primary_key = "..."`: defaults to `id`
//! - `soft_delete = "..."`: defaults to `deleted_at`
//! - `hard_delete`: no soft-delete column, deletes are physical
//!
//! Field attributes `#[belongs_to]`, `#[has_one]` and `#[has_many]` declare a
//! relationship named after the field, with optional `local` and `foreign`
//! column overrides. Relationship fields need `#[serde(default)]` since rows
//! only carry them once loaded.

use proc_macro::TokenStream;
use syn::{parse_macro_input, DeriveInput};

mod codegen;
mod parsing;

use codegen::generate_model_impl;
use parsing::parse_model;

#[proc_macro_derive(Model, attributes(model, belongs_to, has_one, has_many))]
pub fn derive_model(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    let info = match parse_model(&input) {
        Ok(info) => info,
        Err(e) => return e.to_compile_error().into(),
    };

    TokenStream::from(generate_model_impl(&input, &info))
}
