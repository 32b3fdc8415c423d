//! Code generation for the `Model` trait implementation

use proc_macro2::TokenStream;
use quote::quote;
use syn::DeriveInput;

use crate::parsing::{snake_case, ModelInfo, RelationshipInfo, RelationshipKind};

pub fn generate_model_impl(input: &DeriveInput, info: &ModelInfo) -> TokenStream {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let table = &info.table;
    let primary_key = &info.primary_key;
    let soft_delete = match &info.soft_delete {
        Some(column) => quote! { ::std::option::Option::Some(#column) },
        None => quote! { ::std::option::Option::None },
    };

    let owner = snake_case(&name.to_string());
    let relationships: Vec<TokenStream> = info
        .relationships
        .iter()
        .map(|relationship| generate_relationship(relationship, primary_key, &owner))
        .collect();

    quote! {
        impl #impl_generics ::repository::Model for #name #ty_generics #where_clause {
            fn table_name() -> &'static str {
                #table
            }

            fn primary_key() -> &'static str {
                #primary_key
            }

            fn soft_delete_column() -> ::std::option::Option<&'static str> {
                #soft_delete
            }

            fn relationships() -> ::std::vec::Vec<::repository::Relationship> {
                ::std::vec![#(#relationships),*]
            }
        }
    }
}

/// Defaults: `belongs_to` joins `<field>_id` to the target's key, `has_*`
/// joins this model's key to `<owner>_id` on the target.
fn generate_relationship(
    relationship: &RelationshipInfo,
    primary_key: &str,
    owner: &str,
) -> TokenStream {
    let name = &relationship.name;
    let target = &relationship.target;
    let table = quote! { <#target as ::repository::Model>::table_name() };

    let local = match (&relationship.local, relationship.kind) {
        (Some(column), _) => quote! { #column },
        (None, RelationshipKind::BelongsTo) => {
            let column = format!("{}_id", name);
            quote! { #column }
        }
        (None, _) => quote! { #primary_key },
    };

    let foreign = match (&relationship.foreign, relationship.kind) {
        (Some(column), _) => quote! { #column },
        (None, RelationshipKind::BelongsTo) => {
            quote! { <#target as ::repository::Model>::primary_key() }
        }
        (None, _) => {
            let column = format!("{}_id", owner);
            quote! { #column }
        }
    };

    let constructor = match relationship.kind {
        RelationshipKind::BelongsTo => quote! { belongs_to },
        RelationshipKind::HasOne => quote! { has_one },
        RelationshipKind::HasMany => quote! { has_many },
    };

    quote! {
        ::repository::Relationship::#constructor(#name, #table, #local, #foreign)
            .soft_deleted_by(<#target as ::repository::Model>::soft_delete_column())
    }
}
