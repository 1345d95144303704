//! Symbol prefix and case transforms.

use dlbind_core::{SymbolNaming, SymbolTransform};

/// Apply a naming policy to an entry-point name: prefix first, then transform.
pub fn transform_symbol(naming: &SymbolNaming, entry: &str) -> String {
    let concatenated = format!("{}{}", naming.prefix, entry);
    match naming.transform {
        SymbolTransform::None => concatenated,
        SymbolTransform::Pascalize => pascalize(&concatenated),
        SymbolTransform::Camelize => camelize(&concatenated),
        SymbolTransform::Underscore => underscore(&concatenated),
        SymbolTransform::Dasherize => dasherize(&concatenated),
        SymbolTransform::Kebaberize => dasherize(&underscore(&concatenated)),
    }
}

/// `some_name` -> `SomeName`. Underscores and spaces start a new word.
pub fn pascalize(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut word_start = true;
    for c in input.chars() {
        if c == '_' || c == ' ' {
            word_start = true;
            continue;
        }
        if word_start {
            out.extend(c.to_uppercase());
            word_start = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// `some_name` -> `someName`.
pub fn camelize(input: &str) -> String {
    let pascal = pascalize(input);
    let mut chars = pascal.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => pascal,
    }
}

/// `SomeName` -> `some_name`; `HTMLParser` -> `html_parser`.
pub fn underscore(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() && i > 0 {
            let prev = chars[i - 1];
            let next_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            if prev.is_lowercase() || prev.is_ascii_digit() || (prev.is_uppercase() && next_lower) {
                out.push('_');
            }
        }
        if c == '-' || c.is_whitespace() {
            out.push('_');
        } else {
            out.extend(c.to_lowercase());
        }
    }
    out
}

/// `some_name` -> `some-name`.
pub fn dasherize(input: &str) -> String {
    input.replace('_', "-")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn naming(prefix: &str, transform: SymbolTransform) -> SymbolNaming {
        SymbolNaming {
            prefix: prefix.to_string(),
            transform,
        }
    }

    #[test]
    fn prefix_without_transform() {
        assert_eq!(transform_symbol(&naming("lib_", SymbolTransform::None), "Multiply"), "lib_Multiply");
    }

    #[test]
    fn case_transforms() {
        assert_eq!(pascalize("some_native_name"), "SomeNativeName");
        assert_eq!(camelize("some_native_name"), "someNativeName");
        assert_eq!(underscore("SomeNativeName"), "some_native_name");
        assert_eq!(underscore("HTMLParser"), "html_parser");
        assert_eq!(underscore("Vector3Length"), "vector3_length");
        assert_eq!(dasherize("some_name"), "some-name");
    }

    #[test]
    fn transform_applies_after_prefix() {
        assert_eq!(
            transform_symbol(&naming("gl_", SymbolTransform::Pascalize), "clear_color"),
            "GlClearColor"
        );
        assert_eq!(
            transform_symbol(&naming("Mat", SymbolTransform::Underscore), "Multiply"),
            "mat_multiply"
        );
        assert_eq!(
            transform_symbol(&naming("", SymbolTransform::Kebaberize), "GetValue"),
            "get-value"
        );
        assert_eq!(
            transform_symbol(&naming("", SymbolTransform::Camelize), "get_value"),
            "getValue"
        );
    }
}
