//! Query translation - free-form list query strings to structured filters.
//!
//! Follows the api-query-params conventions:
//!
//! | query                | meaning                         |
//! |----------------------|---------------------------------|
//! | `name=A`             | equals                          |
//! | `name!=A`            | not equals                      |
//! | `createdAt>=2024-01-01` | range (`>`, `>=`, `<`, `<=`) |
//! | `email=a@x.com,b@x.com` | one of                       |
//! | `email!=a@x.com,b@x.com` | none of                     |
//! | `phone` / `!phone`   | present / missing               |
//! | `name=/^ng/i`        | regular expression              |
//! | `image=null`         | null                            |
//! | `sort=-name,email`   | ordering                        |
//!
//! Pagination and other control keys never become predicates.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::config::{IGNORED_QUERY_KEYS, QUERY_KEY_CURRENT, QUERY_KEY_PAGE_SIZE, QUERY_KEY_SORT};
use crate::errors::{AppError, AppResult};

/// Storage type of a filterable field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Id,
    Timestamp,
}

/// User fields that may appear in filters and sort keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UserField {
    Id,
    Name,
    Email,
    Phone,
    Address,
    Image,
    CodeId,
    CodeExpired,
    CreatedAt,
    UpdatedAt,
}

impl UserField {
    pub fn kind(self) -> FieldKind {
        match self {
            UserField::Id | UserField::CodeId => FieldKind::Id,
            UserField::CodeExpired | UserField::CreatedAt | UserField::UpdatedAt => {
                FieldKind::Timestamp
            }
            _ => FieldKind::Text,
        }
    }

    /// Whether the column can hold null.
    pub fn is_nullable(self) -> bool {
        matches!(
            self,
            UserField::Phone
                | UserField::Address
                | UserField::Image
                | UserField::CodeId
                | UserField::CodeExpired
        )
    }
}

impl FromStr for UserField {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "id" | "_id" => Ok(UserField::Id),
            "name" => Ok(UserField::Name),
            "email" => Ok(UserField::Email),
            "phone" => Ok(UserField::Phone),
            "address" => Ok(UserField::Address),
            "image" => Ok(UserField::Image),
            "codeId" => Ok(UserField::CodeId),
            "codeExpired" => Ok(UserField::CodeExpired),
            "createdAt" => Ok(UserField::CreatedAt),
            "updatedAt" => Ok(UserField::UpdatedAt),
            other => Err(AppError::invalid_query(format!("unknown field '{}'", other))),
        }
    }
}

impl fmt::Display for UserField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UserField::Id => "id",
            UserField::Name => "name",
            UserField::Email => "email",
            UserField::Phone => "phone",
            UserField::Address => "address",
            UserField::Image => "image",
            UserField::CodeId => "codeId",
            UserField::CodeExpired => "codeExpired",
            UserField::CreatedAt => "createdAt",
            UserField::UpdatedAt => "updatedAt",
        };
        f.write_str(name)
    }
}

/// Typed comparison operand.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Text(String),
    Id(Uuid),
    Timestamp(DateTime<Utc>),
    Null,
}

/// Comparison applied to one field.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Eq(FilterValue),
    Ne(FilterValue),
    Gt(FilterValue),
    Gte(FilterValue),
    Lt(FilterValue),
    Lte(FilterValue),
    In(Vec<FilterValue>),
    NotIn(Vec<FilterValue>),
    Exists(bool),
    Matches {
        pattern: String,
        case_insensitive: bool,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldFilter {
    pub field: UserField,
    pub predicate: Predicate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKey {
    pub field: UserField,
    pub direction: SortDirection,
}

/// Structured "which records, in what order".
///
/// All filters must hold (logical AND).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserQuery {
    pub filters: Vec<FieldFilter>,
    pub sort: Vec<SortKey>,
}

impl UserQuery {
    /// Parse a raw (URL-encoded) query string.
    pub fn parse(raw: &str) -> AppResult<Self> {
        let raw = raw.trim().trim_start_matches('?');
        let pairs: Vec<(String, String)> = serde_urlencoded::from_str(raw)
            .map_err(|e| AppError::invalid_query(e.to_string()))?;

        let mut query = UserQuery::default();
        for (key, value) in pairs {
            if key.is_empty() {
                continue;
            }
            if key == QUERY_KEY_SORT {
                query.sort.extend(parse_sort(&value)?);
                continue;
            }
            if is_control_key(&key) {
                continue;
            }
            query.filters.push(parse_filter(&key, &value)?);
        }

        Ok(query)
    }

    pub fn is_unfiltered(&self) -> bool {
        self.filters.is_empty()
    }
}

fn is_control_key(key: &str) -> bool {
    let key = key.trim_start_matches('!');
    key == QUERY_KEY_CURRENT || key == QUERY_KEY_PAGE_SIZE || IGNORED_QUERY_KEYS.contains(&key)
}

/// Comparison operator recovered from a `key=value` split.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

/// Recover field, operator and operand.
///
/// `age>=3` arrives as key `age>` / value `3`; `age>3` arrives as key
/// `age>3` / empty value.
fn split_operator(key: &str, value: &str) -> Option<(String, Operator, String)> {
    if let Some(field) = key.strip_suffix('!') {
        return Some((field.to_string(), Operator::Ne, value.to_string()));
    }
    if let Some(field) = key.strip_suffix('>') {
        return Some((field.to_string(), Operator::Gte, value.to_string()));
    }
    if let Some(field) = key.strip_suffix('<') {
        return Some((field.to_string(), Operator::Lte, value.to_string()));
    }
    if value.is_empty() {
        if let Some(pos) = key.find(['>', '<']) {
            let op = if key[pos..].starts_with('>') {
                Operator::Gt
            } else {
                Operator::Lt
            };
            return Some((key[..pos].to_string(), op, key[pos + 1..].to_string()));
        }
        return None;
    }
    Some((key.to_string(), Operator::Eq, value.to_string()))
}

fn parse_filter(key: &str, value: &str) -> AppResult<FieldFilter> {
    let key = key.trim();

    let Some((name, op, operand)) = split_operator(key, value) else {
        // Bare key: presence test, `!key` for absence.
        let (name, present) = match key.strip_prefix('!') {
            Some(name) => (name, false),
            None => (key, true),
        };
        let field: UserField = name.parse()?;
        return Ok(FieldFilter {
            field,
            predicate: Predicate::Exists(present),
        });
    };

    let field: UserField = name.trim().parse()?;
    let predicate = match op {
        Operator::Eq | Operator::Ne => {
            if let Some((pattern, case_insensitive)) = parse_regex_literal(&operand)? {
                if op == Operator::Ne {
                    return Err(AppError::invalid_query(format!(
                        "negated regular expressions are not supported for '{}'",
                        field
                    )));
                }
                if field.kind() != FieldKind::Text {
                    return Err(AppError::invalid_query(format!(
                        "regular expressions only apply to text fields, not '{}'",
                        field
                    )));
                }
                Predicate::Matches {
                    pattern,
                    case_insensitive,
                }
            } else if operand.contains(',') {
                let values = operand
                    .split(',')
                    .map(|item| parse_value(field, item))
                    .collect::<AppResult<Vec<_>>>()?;
                if op == Operator::Eq {
                    Predicate::In(values)
                } else {
                    Predicate::NotIn(values)
                }
            } else {
                let value = parse_value(field, &operand)?;
                if op == Operator::Eq {
                    Predicate::Eq(value)
                } else {
                    Predicate::Ne(value)
                }
            }
        }
        Operator::Gt | Operator::Gte | Operator::Lt | Operator::Lte => {
            let value = parse_value(field, &operand)?;
            if value == FilterValue::Null {
                return Err(AppError::invalid_query(format!(
                    "range comparison on '{}' needs a value",
                    field
                )));
            }
            match op {
                Operator::Gt => Predicate::Gt(value),
                Operator::Gte => Predicate::Gte(value),
                Operator::Lt => Predicate::Lt(value),
                _ => Predicate::Lte(value),
            }
        }
    };

    Ok(FieldFilter { field, predicate })
}

/// `/pattern/flags` → (pattern, case-insensitive).
fn parse_regex_literal(operand: &str) -> AppResult<Option<(String, bool)>> {
    let Some(body) = operand.strip_prefix('/') else {
        return Ok(None);
    };
    let Some(end) = body.rfind('/') else {
        return Ok(None);
    };
    let (pattern, flags) = (&body[..end], &body[end + 1..]);
    if flags.chars().any(|c| !matches!(c, 'i' | 'm' | 's' | 'x' | 'u' | 'g')) {
        return Ok(None);
    }
    regex::Regex::new(pattern)
        .map_err(|e| AppError::invalid_query(format!("invalid regular expression: {}", e)))?;
    if let Some(construct) = unsupported_construct(pattern) {
        return Err(AppError::invalid_query(format!(
            "regular expression uses unsupported {}",
            construct
        )));
    }
    Ok(Some((pattern.to_string(), flags.contains('i'))))
}

/// Syntax the `regex` crate accepts but PostgreSQL's ARE engine rejects or
/// reads differently.
fn unsupported_construct(pattern: &str) -> Option<&'static str> {
    let mut chars = pattern.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '\\' => match chars.next().map(|(_, escaped)| escaped) {
                Some('p' | 'P') => return Some("Unicode class (\\p, \\P)"),
                Some('z') => return Some("anchor \\z"),
                Some('b' | 'B') => return Some("word boundary (\\b, \\B)"),
                _ => {}
            },
            '(' => {
                let rest = &pattern[i + 1..];
                let Some(group) = rest.strip_prefix('?') else {
                    continue;
                };
                if group.starts_with(|ch: char| ch.is_ascii_alphabetic()) {
                    return Some("named group or inline flags");
                }
                if let Some(after) = group.strip_prefix('<') {
                    if !after.starts_with(|ch: char| ch == '=' || ch == '!') {
                        return Some("named group");
                    }
                }
            }
            _ => {}
        }
    }
    None
}

fn parse_value(field: UserField, raw: &str) -> AppResult<FilterValue> {
    let raw = raw.trim();
    if raw == "null" {
        return Ok(FilterValue::Null);
    }
    match field.kind() {
        FieldKind::Text => Ok(FilterValue::Text(raw.to_string())),
        FieldKind::Id => Uuid::parse_str(raw)
            .map(FilterValue::Id)
            .map_err(|_| AppError::invalid_query(format!("'{}' is not a valid {}", raw, field))),
        FieldKind::Timestamp => parse_timestamp(raw)
            .map(FilterValue::Timestamp)
            .ok_or_else(|| {
                AppError::invalid_query(format!("'{}' is not a valid date for {}", raw, field))
            }),
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn parse_sort(raw: &str) -> AppResult<Vec<SortKey>> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| {
            let (direction, name) = match item.strip_prefix('-') {
                Some(name) => (SortDirection::Desc, name),
                None => (SortDirection::Asc, item.trim_start_matches('+')),
            };
            Ok(SortKey {
                field: name.parse()?,
                direction,
            })
        })
        .collect()
}
