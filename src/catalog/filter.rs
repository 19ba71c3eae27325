//! RSQL-style filter expressions and query parameters for catalog requests.

use std::fmt;

/// Boolean filter expression rendered into the `filter=` parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    Eq(String, String),
    In(String, Vec<String>),
    And(Vec<Filter>),
    Or(Vec<Filter>),
}

impl Filter {
    /// `field==value`
    pub fn eq(field: impl Into<String>, value: impl ToString) -> Self {
        Self::Eq(field.into(), value.to_string())
    }

    /// `field=in=(a,b,c)`
    pub fn is_in<I, S>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::In(field.into(), values.into_iter().map(Into::into).collect())
    }

    pub fn and(self, other: Filter) -> Self {
        match self {
            Self::And(mut parts) => {
                parts.push(other);
                Self::And(parts)
            }
            first => Self::And(vec![first, other]),
        }
    }

    pub fn or(self, other: Filter) -> Self {
        match self {
            Self::Or(mut parts) => {
                parts.push(other);
                Self::Or(parts)
            }
            first => Self::Or(vec![first, other]),
        }
    }

    /// Disjunction of all given filters; `None` when empty
    pub fn any(filters: impl IntoIterator<Item = Filter>) -> Option<Self> {
        let parts: Vec<Filter> = filters.into_iter().collect();
        match parts.len() {
            0 => None,
            1 => parts.into_iter().next(),
            _ => Some(Self::Or(parts)),
        }
    }

    fn fmt_child(&self, child: &Filter, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let needs_parens = matches!(
            (self, child),
            (Self::And(_), Self::Or(_)) | (Self::Or(_), Self::And(_))
        );
        if needs_parens {
            write!(f, "({child})")
        } else {
            write!(f, "{child}")
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Eq(field, value) => write!(f, "{field}=={value}"),
            Self::In(field, values) => write!(f, "{field}=in=({})", values.join(",")),
            Self::And(parts) | Self::Or(parts) => {
                let joiner = if matches!(self, Self::And(_)) {
                    " and "
                } else {
                    " or "
                };
                for (i, part) in parts.iter().enumerate() {
                    if i > 0 {
                        f.write_str(joiner)?;
                    }
                    self.fmt_child(part, f)?;
                }
                Ok(())
            }
        }
    }
}

/// Query parameters for one catalog request, excluding pagination
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    pub filter: Option<Filter>,
    pub include: Vec<String>,
    pub extra: Vec<(String, String)>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn include(mut self, fields: &[&str]) -> Self {
        self.include.extend(fields.iter().map(|f| f.to_string()));
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn maybe_filter(mut self, filter: Option<Filter>) -> Self {
        self.filter = filter;
        self
    }

    pub fn param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.extra.push((key.into(), value.to_string()));
        self
    }

    /// Render as query pairs in a stable order
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::with_capacity(self.extra.len() + 2);
        if !self.include.is_empty() {
            pairs.push(("include".to_string(), self.include.join(",")));
        }
        if let Some(filter) = &self.filter {
            pairs.push(("filter".to_string(), filter.to_string()));
        }
        pairs.extend(self.extra.iter().cloned());
        pairs
    }
}
