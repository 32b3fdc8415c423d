//! Parsing utilities for model and relationship attributes
//!
//! Handles `#[model(...)]` on the struct and `#[belongs_to]`, `#[has_one]`,
//! `#[has_many]` on fields, plus validation of the SQL names they produce.

use syn::{
    Attribute, Data, DeriveInput, Error, Fields, GenericArgument, LitStr, PathArguments, Result,
    Type,
};

/// Validate a SQL name and return syn::Error for better proc macro error handling
pub fn validate_name_syn(kind: &str, name: &str, span: proc_macro2::Span) -> Result<()> {
    validate_identifier(name)
        .map_err(|e| Error::new(span, format!("Invalid {} '{}': {}", kind, name, e)))
}

fn validate_identifier(name: &str) -> std::result::Result<(), String> {
    if name.is_empty() {
        return Err("Name cannot be empty".to_string());
    }

    // PostgreSQL limit
    if name.len() > 63 {
        return Err(format!(
            "Name '{}' is too long: {} characters (max 63)",
            name,
            name.len()
        ));
    }

    let first_char = name
        .chars()
        .next()
        .ok_or_else(|| "Name cannot be empty".to_string())?;
    if !first_char.is_ascii_alphabetic() && first_char != '_' {
        return Err(format!(
            "Name '{}' must start with a letter or underscore",
            name
        ));
    }

    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(format!("Name '{}' contains invalid characters: only alphanumeric characters and underscores are allowed", name));
    }

    if is_reserved_keyword(name) {
        return Err(format!("Name '{}' is a reserved SQL keyword", name));
    }

    Ok(())
}

/// Keywords that cannot be used unquoted as table or column names
fn is_reserved_keyword(name: &str) -> bool {
    const RESERVED_KEYWORDS: &[&str] = &[
        "ALL", "AND", "AS", "ASC", "BETWEEN", "BY", "CASE", "CHECK", "COLUMN", "CONSTRAINT",
        "CREATE", "DEFAULT", "DELETE", "DESC", "DISTINCT", "DROP", "ELSE", "END", "EXCEPT",
        "EXISTS", "FALSE", "FOREIGN", "FROM", "GROUP", "HAVING", "IN", "INNER", "INSERT",
        "INTERSECT", "INTO", "IS", "JOIN", "LEFT", "LIKE", "LIMIT", "NOT", "NULL", "OFFSET",
        "ON", "OR", "ORDER", "OUTER", "PRIMARY", "REFERENCES", "RETURNING", "RIGHT", "SELECT",
        "SET", "TABLE", "THEN", "TRUE", "UNION", "UNIQUE", "UPDATE", "USING", "VALUES", "WHEN",
        "WHERE", "WITH",
    ];

    RESERVED_KEYWORDS.contains(&name.to_ascii_uppercase().as_str())
}

/// `ModelMock` -> `model_mock`
pub fn snake_case(name: &str) -> String {
    let mut snake = String::with_capacity(name.len() + 4);
    let chars: Vec<char> = name.chars().collect();

    for (i, c) in chars.iter().enumerate() {
        if c.is_uppercase() {
            let after_lower =
                i > 0 && (chars[i - 1].is_lowercase() || chars[i - 1].is_ascii_digit());
            let acronym_end = i > 0
                && chars[i - 1].is_uppercase()
                && chars.get(i + 1).is_some_and(|next| next.is_lowercase());
            if after_lower || acronym_end {
                snake.push('_');
            }
            snake.extend(c.to_lowercase());
        } else {
            snake.push(*c);
        }
    }

    snake
}

/// English plural of a snake_case name, applied to its last word
pub fn pluralize(name: &str) -> String {
    if name.ends_with('s')
        || name.ends_with('x')
        || name.ends_with('z')
        || name.ends_with("ch")
        || name.ends_with("sh")
    {
        return format!("{}es", name);
    }

    if let Some(stem) = name.strip_suffix('y') {
        let before = stem.chars().last();
        if before.is_some_and(|c| !"aeiou".contains(c)) {
            return format!("{}ies", stem);
        }
    }

    format!("{}s", name)
}

/// Default table name for a struct: snake_case plural
pub fn table_name_for(struct_name: &str) -> String {
    pluralize(&snake_case(struct_name))
}

#[derive(Debug)]
pub struct ModelInfo {
    pub table: String,
    pub primary_key: String,
    /// `None` makes deletes physical
    pub soft_delete: Option<String>,
    pub relationships: Vec<RelationshipInfo>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationshipKind {
    BelongsTo,
    HasOne,
    HasMany,
}

impl RelationshipKind {
    fn from_attribute(attr: &Attribute) -> Option<Self> {
        let path = attr.path();
        if path.is_ident("belongs_to") {
            Some(Self::BelongsTo)
        } else if path.is_ident("has_one") {
            Some(Self::HasOne)
        } else if path.is_ident("has_many") {
            Some(Self::HasMany)
        } else {
            None
        }
    }
}

#[derive(Debug)]
pub struct RelationshipInfo {
    pub kind: RelationshipKind,
    /// Field name, also the join alias
    pub name: String,
    /// The related model (`Option`/`Vec`/`Box` unwrapped)
    pub target: Type,
    /// `None` falls back to the default for `kind`
    pub local: Option<String>,
    pub foreign: Option<String>,
}

pub fn parse_model(input: &DeriveInput) -> Result<ModelInfo> {
    let mut table = None;
    let mut primary_key = None;
    let mut soft_delete = None;
    let mut hard_delete = false;

    for attr in input.attrs.iter().filter(|attr| attr.path().is_ident("model")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("table") {
                let value: LitStr = meta.value()?.parse()?;
                validate_name_syn("table name", &value.value(), value.span())?;
                table = Some(value.value());
            } else if meta.path.is_ident("primary_key") {
                let value: LitStr = meta.value()?.parse()?;
                validate_name_syn("primary key", &value.value(), value.span())?;
                primary_key = Some(value.value());
            } else if meta.path.is_ident("soft_delete") {
                let value: LitStr = meta.value()?.parse()?;
                validate_name_syn("soft delete column", &value.value(), value.span())?;
                soft_delete = Some(value.value());
            } else if meta.path.is_ident("hard_delete") {
                hard_delete = true;
            } else {
                return Err(meta.error(
                    "unknown model attribute: expected table, primary_key, soft_delete or hard_delete",
                ));
            }
            Ok(())
        })?;
    }

    if hard_delete && soft_delete.is_some() {
        return Err(Error::new_spanned(
            &input.ident,
            "hard_delete cannot be combined with soft_delete",
        ));
    }

    let table = match table {
        Some(table) => table,
        None => {
            let table = table_name_for(&input.ident.to_string());
            validate_name_syn("table name", &table, input.ident.span())?;
            table
        }
    };

    let soft_delete = if hard_delete {
        None
    } else {
        Some(soft_delete.unwrap_or_else(|| "deleted_at".to_string()))
    };

    Ok(ModelInfo {
        table,
        primary_key: primary_key.unwrap_or_else(|| "id".to_string()),
        soft_delete,
        relationships: parse_relationships(&input.data)?,
    })
}

fn parse_relationships(data: &Data) -> Result<Vec<RelationshipInfo>> {
    let fields = match data {
        Data::Struct(data_struct) => match &data_struct.fields {
            Fields::Named(fields_named) => &fields_named.named,
            _ => {
                return Err(Error::new(
                    proc_macro2::Span::call_site(),
                    "Model can only be derived for structs with named fields",
                ))
            }
        },
        _ => {
            return Err(Error::new(
                proc_macro2::Span::call_site(),
                "Model can only be derived for structs with named fields",
            ))
        }
    };

    let mut relationships = Vec::new();
    for field in fields {
        for attr in &field.attrs {
            let Some(kind) = RelationshipKind::from_attribute(attr) else {
                continue;
            };

            let ident = field
                .ident
                .as_ref()
                .ok_or_else(|| Error::new_spanned(field, "Field must have a name"))?;
            let name = ident.to_string().trim_start_matches("r#").to_string();

            let mut local = None;
            let mut foreign = None;
            // `#[has_many]` without arguments takes every default
            if matches!(attr.meta, syn::Meta::List(_)) {
                attr.parse_nested_meta(|meta| {
                    let value: LitStr = meta.value()?.parse()?;
                    validate_name_syn("column", &value.value(), value.span())?;
                    if meta.path.is_ident("local") {
                        local = Some(value.value());
                    } else if meta.path.is_ident("foreign") {
                        foreign = Some(value.value());
                    } else {
                        return Err(meta.error(
                            "unknown relationship attribute: expected local or foreign",
                        ));
                    }
                    Ok(())
                })?;
            }

            relationships.push(RelationshipInfo {
                kind,
                name,
                target: related_type(&field.ty).clone(),
                local,
                foreign,
            });
        }
    }

    Ok(relationships)
}

/// `Option<T>`, `Vec<T>` and `Box<T>` resolve to `T`
pub fn related_type(ty: &Type) -> &Type {
    if let Type::Path(type_path) = ty {
        if let Some(segment) = type_path.path.segments.last() {
            let wrapper = matches!(segment.ident.to_string().as_str(), "Option" | "Vec" | "Box");
            if let (true, PathArguments::AngleBracketed(args)) = (wrapper, &segment.arguments) {
                if let Some(GenericArgument::Type(inner)) = args.args.first() {
                    return related_type(inner);
                }
            }
        }
    }

    ty
}
