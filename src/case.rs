//! Naming helpers: default storage names for types and fields, identifier checks.

/// Convert a single identifier from camelCase / PascalCase to snake_case.
/// e.g. "userId" -> "user_id", "UserPerso" -> "user_perso"
pub fn to_snake_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 4);
    for (i, c) in s.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 && !out.ends_with('_') {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Last path segment of a Rust type name, without generic arguments.
/// e.g. "my_app::model::User" -> "User"
pub fn short_type_name(full: &str) -> &str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// SQL-safe identifier: ASCII letter or underscore, then letters, digits, underscores.
pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snake_case_from_camel_and_pascal() {
        assert_eq!(to_snake_case("userId"), "user_id");
        assert_eq!(to_snake_case("UserPerso"), "user_perso");
        assert_eq!(to_snake_case("created_at"), "created_at");
        assert_eq!(to_snake_case("Already_Split"), "already_split");
    }

    #[test]
    fn short_type_name_strips_path_and_generics() {
        assert_eq!(short_type_name("app::model::User"), "User");
        assert_eq!(short_type_name("Wrapper<app::Inner>"), "Wrapper");
        assert_eq!(short_type_name("Plain"), "Plain");
    }

    #[test]
    fn identifiers() {
        assert!(is_identifier("user_2"));
        assert!(is_identifier("_hidden"));
        assert!(!is_identifier("2user"));
        assert!(!is_identifier("user name"));
        assert!(!is_identifier("x\"; DROP"));
        assert!(!is_identifier(""));
    }
}
