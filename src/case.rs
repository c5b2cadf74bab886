//! Identifier case conversion: client-facing field names -> backing column names.

/// Naming convention of a resource's backing columns. Sort fields arriving from
/// the client are converted with this before they are matched against columns.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldCase {
    Snake,
    Camel,
    Pascal,
}

impl FieldCase {
    pub fn convert(&self, s: &str) -> String {
        match self {
            FieldCase::Snake => to_snake_case(s),
            FieldCase::Camel => to_camel_case(s),
            FieldCase::Pascal => to_pascal_case(s),
        }
    }
}

/// e.g. "user_id" -> "userId", "created_at" -> "createdAt"
pub fn to_camel_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut capitalize_next = false;
    for c in s.chars() {
        if c == '_' {
            capitalize_next = true;
        } else if capitalize_next {
            out.extend(c.to_uppercase());
            capitalize_next = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// e.g. "userId" -> "user_id", "createdAt" -> "created_at"
pub fn to_snake_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 4);
    for (i, c) in s.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// e.g. "user_id" -> "UserId", "createdAt" -> "CreatedAt"
pub fn to_pascal_case(s: &str) -> String {
    let camel = to_camel_case(s);
    let mut chars = camel.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => camel,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snake_from_camel() {
        assert_eq!(to_snake_case("createdAt"), "created_at");
        assert_eq!(to_snake_case("userId"), "user_id");
        assert_eq!(to_snake_case("already_snake"), "already_snake");
    }

    #[test]
    fn camel_from_snake() {
        assert_eq!(to_camel_case("created_at"), "createdAt");
        assert_eq!(to_camel_case("user_id"), "userId");
    }

    #[test]
    fn pascal() {
        assert_eq!(to_pascal_case("created_at"), "CreatedAt");
        assert_eq!(to_pascal_case("userId"), "UserId");
    }

    #[test]
    fn field_case_convert() {
        assert_eq!(FieldCase::Snake.convert("createdAt"), "created_at");
        assert_eq!(FieldCase::Camel.convert("created_at"), "createdAt");
        assert_eq!(FieldCase::Pascal.convert("created_at"), "CreatedAt");
    }
}
