// ABOUTME: Identifier normalization matching the casing prost-build and tonic-build emit.
// ABOUTME: Converts definition-file names into Rust type, method, module and path names.

use heck::{ToSnakeCase, ToUpperCamelCase};

/// Convert to UpperCamelCase: `pet_store` and `PET_STORE` become `PetStore`.
pub fn to_upper_camel(input: &str) -> String {
    let ident = input.to_upper_camel_case();
    match ident.as_str() {
        // `Self` cannot be a type name or a raw identifier.
        "Self" => "Self_".to_string(),
        _ => ident,
    }
}

/// Convert to snake_case without keyword handling.
pub fn to_snake_case(input: &str) -> String {
    input.to_snake_case()
}

const RUST_KEYWORDS: &[&str] = &[
    "abstract", "as", "async", "await", "become", "box", "break", "const", "continue", "do",
    "dyn", "else", "enum", "false", "final", "fn", "for", "gen", "if", "impl", "in", "let",
    "loop", "macro", "match", "mod", "move", "mut", "override", "priv", "pub", "ref", "return",
    "static", "struct", "trait", "true", "try", "type", "typeof", "unsafe", "unsized", "use",
    "virtual", "where", "while", "yield",
];

/// Convert to a snake_case identifier, escaping Rust keywords.
///
/// Keywords become raw identifiers (`type` -> `r#type`); the few keywords
/// that cannot be raw get a trailing underscore.
pub fn to_snake_ident(input: &str) -> String {
    let ident = to_snake_case(input);
    match ident.as_str() {
        "self" | "super" | "crate" | "extern" => format!("{ident}_"),
        s if RUST_KEYWORDS.contains(&s) => format!("r#{ident}"),
        _ => ident,
    }
}

/// Module name tonic-build gives a service's server or client module.
///
/// tonic-build lowercases each character and inserts `_` before every
/// uppercase one, without grouping acronyms.
pub fn module_name(service_type: &str, role_suffix: &str) -> String {
    let mut out = String::with_capacity(service_type.len() + role_suffix.len() + 4);
    let mut chars = service_type.chars().peekable();
    while let Some(c) = chars.next() {
        out.push(c.to_ascii_lowercase());
        if chars.peek().is_some_and(|n| n.is_uppercase()) {
            out.push('_');
        }
    }
    out.push('_');
    out.push_str(role_suffix);
    out
}

/// Rust path of a message type referenced from a service in `package`.
///
/// The path is relative to the module tonic-build writes for `package`:
/// `Pet` stays `Pet`, nested `Outer.Inner` becomes `outer::Inner`, and a
/// type from a sibling package becomes a `super::` path. Well-known types
/// resolve the way prost maps them.
pub fn message_path(type_ref: &str, package: Option<&str>) -> String {
    let type_ref = type_ref.trim().trim_start_matches('.');

    if let Some(wkt) = type_ref.strip_prefix("google.protobuf.") {
        return match wkt {
            "Empty" => "()".to_string(),
            other => format!("::prost_types::{}", to_upper_camel(other)),
        };
    }

    let segments: Vec<&str> = type_ref.split('.').filter(|s| !s.is_empty()).collect();
    let Some((last, parents)) = segments.split_last() else {
        return String::new();
    };

    // Leading lowercase segments name a package; the rest name messages.
    let package_len = parents
        .iter()
        .take_while(|s| s.chars().next().is_some_and(char::is_lowercase))
        .count();
    let (type_package, outer_messages) = parents.split_at(package_len);

    let mut path: Vec<String> = Vec::new();
    if !type_package.is_empty() {
        let local: Vec<&str> = package
            .map(|p| p.split('.').filter(|s| !s.is_empty()).collect())
            .unwrap_or_default();
        let shared = local
            .iter()
            .zip(type_package.iter())
            .take_while(|(a, b)| a == b)
            .count();
        path.extend(local[shared..].iter().map(|_| "super".to_string()));
        path.extend(type_package[shared..].iter().map(|s| to_snake_ident(s)));
    }
    path.extend(outer_messages.iter().map(|s| to_snake_ident(s)));
    path.push(to_upper_camel(last));
    path.join("::")
}
