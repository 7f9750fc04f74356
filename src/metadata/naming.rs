use serde::Deserialize;

/// Translates property names between the client model and the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NamingConvention {
    /// Names are identical on both sides
    #[default]
    None,
    /// camelCase on the client, PascalCase on the server
    CamelCase,
}

impl NamingConvention {
    pub fn client_to_server(&self, name: &str) -> String {
        match self {
            Self::None => name.to_string(),
            Self::CamelCase => with_first_char(name, |c| c.to_ascii_uppercase()),
        }
    }

    pub fn server_to_client(&self, name: &str) -> String {
        match self {
            Self::None => name.to_string(),
            Self::CamelCase => with_first_char(name, |c| c.to_ascii_lowercase()),
        }
    }
}

fn with_first_char(name: &str, f: impl Fn(char) -> char) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => std::iter::once(f(first)).chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camel_case_round_trip() {
        let nc = NamingConvention::CamelCase;
        assert_eq!(nc.client_to_server("companyName"), "CompanyName");
        assert_eq!(nc.server_to_client("CompanyName"), "companyName");
        assert_eq!(nc.client_to_server(""), "");
    }

    #[test]
    fn test_none_is_identity() {
        assert_eq!(NamingConvention::None.client_to_server("freight"), "freight");
    }
}
