//! Ordering descriptor

/// ORDER BY entry; `column` is used as written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub column: String,
    pub descending: bool,
}

impl Order {
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            descending: false,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            descending: true,
        }
    }

    pub fn to_sql(&self) -> String {
        if self.descending {
            format!("{} DESC", self.column)
        } else {
            format!("{} ASC", self.column)
        }
    }
}
