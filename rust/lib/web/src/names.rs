//! Conversion between client names (`res.partner`, `search_read`) and
//! model and method names (`Partner`, `SearchRead`).

use hexya_core::title_case;

/// Client model names that do not follow the title-case rule.
const MODEL_NAMES: &[(&str, &str)] = &[
    ("res.users", "User"),
    ("res.partner", "Partner"),
    ("res.groups", "Group"),
    ("res.company", "Company"),
    ("ir.filters", "Filter"),
    ("ir.attachment", "Attachment"),
    ("ir.translation", "Translation"),
    ("res.currency", "Currency"),
    ("res.currency.rate", "CurrencyRate"),
];

/// `res.partner` -> `Partner`, `res.country` -> `ResCountry`.
pub fn model_name(client: &str) -> String {
    if let Some((_, model)) = MODEL_NAMES.iter().find(|(c, _)| *c == client) {
        return model.to_string();
    }
    client.split('.').map(title_case).collect()
}

/// `search_read` -> `SearchRead`.
pub fn method_name(client: &str) -> String {
    client.split('_').map(title_case).collect()
}

/// `Partner` -> `res.partner`. Models outside the table are split on
/// upper-case letters: `ResCountry` -> `res.country`.
pub fn client_model_name(model: &str) -> String {
    if let Some((client, _)) = MODEL_NAMES.iter().find(|(_, m)| *m == model) {
        return client.to_string();
    }
    split_words(model).join(".")
}

/// `SearchRead` -> `search_read`.
pub fn client_method_name(method: &str) -> String {
    split_words(method).join("_")
}

fn split_words(s: &str) -> Vec<String> {
    let mut words: Vec<String> = Vec::new();
    for c in s.chars() {
        if c.is_uppercase() || words.is_empty() {
            words.push(String::new());
        }
        if let Some(word) = words.last_mut() {
            word.extend(c.to_lowercase());
        }
    }
    words
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_names() {
        assert_eq!(model_name("res.partner"), "Partner");
        assert_eq!(model_name("res.currency.rate"), "CurrencyRate");
        assert_eq!(model_name("res.country"), "ResCountry");
        assert_eq!(model_name("Partner"), "Partner");
        assert_eq!(model_name("Country"), "Country");
    }

    #[test]
    fn method_names() {
        assert_eq!(method_name("search_read"), "SearchRead");
        assert_eq!(method_name("read"), "Read");
        assert_eq!(method_name("name_search"), "NameSearch");
        assert_eq!(method_name("Read"), "Read");
    }

    #[test]
    fn reverse_names() {
        assert_eq!(client_method_name("SearchRead"), "search_read");
        assert_eq!(client_method_name("Read"), "read");
        assert_eq!(client_model_name("Partner"), "res.partner");
        assert_eq!(client_model_name("CurrencyRate"), "res.currency.rate");
        assert_eq!(client_model_name("ResCountry"), "res.country");
    }
}
