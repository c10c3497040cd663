use crate::smtp::{MailError, MailResult};
use lettre::{message::Mailbox, Address};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::str::FromStr;

static MAIL_ADDRESS_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^[A-Z0-9._%+-]+@[A-Z0-9.-]+\.[A-Z]{2,}$").unwrap()
});

/// A single address as callers hand it in: bare, or paired with a display name
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressInput {
    /// `jo@example.com`
    Bare(String),
    /// `("Jo", "jo@example.com")`; `None` marks an absent display name
    Named(Option<String>, String),
}

impl AddressInput {
    /// The address part, without any display name
    pub fn address(&self) -> &str {
        match self {
            AddressInput::Bare(address) => address,
            AddressInput::Named(_, address) => address,
        }
    }

    /// Parse the `Name <addr>`, `"Name" <addr>` or `addr` display form.
    ///
    /// The result is not validated; pass it through [`normalize`] for that.
    pub fn parse_display(input: &str) -> Self {
        let trimmed = input.trim();

        if let (Some(start), Some(end)) = (trimmed.find('<'), trimmed.rfind('>')) {
            if start < end {
                let name = trimmed[..start].trim().trim_matches('"').trim();
                let address = trimmed[start + 1..end].trim().to_string();
                let name = (!name.is_empty()).then(|| name.to_string());
                return AddressInput::Named(name, address);
            }
        }

        AddressInput::Bare(trimmed.to_string())
    }
}

impl fmt::Display for AddressInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressInput::Bare(address) => write!(f, "{}", address),
            AddressInput::Named(Some(name), address) => write!(f, "({}, {})", name, address),
            AddressInput::Named(None, address) => write!(f, "(-, {})", address),
        }
    }
}

impl From<&str> for AddressInput {
    fn from(address: &str) -> Self {
        AddressInput::Bare(address.to_string())
    }
}

impl From<String> for AddressInput {
    fn from(address: String) -> Self {
        AddressInput::Bare(address)
    }
}

impl From<(&str, &str)> for AddressInput {
    fn from((name, address): (&str, &str)) -> Self {
        AddressInput::Named(Some(name.to_string()), address.to_string())
    }
}

impl From<(String, String)> for AddressInput {
    fn from((name, address): (String, String)) -> Self {
        AddressInput::Named(Some(name), address)
    }
}

impl From<(Option<&str>, &str)> for AddressInput {
    fn from((name, address): (Option<&str>, &str)) -> Self {
        AddressInput::Named(name.map(str::to_string), address.to_string())
    }
}

/// A boolean in the name slot is the absence marker, whatever its value.
impl From<(bool, &str)> for AddressInput {
    fn from((_, address): (bool, &str)) -> Self {
        AddressInput::Named(None, address.to_string())
    }
}

/// An ordered list of addresses, either as one CSV string or as separate items
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressList {
    Csv(String),
    Items(Vec<AddressInput>),
}

impl AddressList {
    /// True when the list holds no address at all
    pub fn is_empty(&self) -> bool {
        match self {
            AddressList::Csv(csv) => csv.trim().is_empty(),
            AddressList::Items(items) => items.is_empty(),
        }
    }

    /// Split into individual inputs, trimming CSV tokens
    pub fn to_inputs(&self) -> Vec<AddressInput> {
        match self {
            AddressList::Csv(csv) if csv.trim().is_empty() => Vec::new(),
            AddressList::Csv(csv) => csv
                .split(',')
                .map(|token| AddressInput::Bare(token.trim().to_string()))
                .collect(),
            AddressList::Items(items) => items.clone(),
        }
    }
}

impl Default for AddressList {
    fn default() -> Self {
        AddressList::Items(Vec::new())
    }
}

impl From<&str> for AddressList {
    fn from(csv: &str) -> Self {
        AddressList::Csv(csv.to_string())
    }
}

impl From<String> for AddressList {
    fn from(csv: String) -> Self {
        AddressList::Csv(csv)
    }
}

impl From<AddressInput> for AddressList {
    fn from(input: AddressInput) -> Self {
        AddressList::Items(vec![input])
    }
}

impl From<(&str, &str)> for AddressList {
    fn from(pair: (&str, &str)) -> Self {
        AddressList::Items(vec![pair.into()])
    }
}

impl<T: Into<AddressInput>> From<Vec<T>> for AddressList {
    fn from(items: Vec<T>) -> Self {
        AddressList::Items(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<AddressInput>, const N: usize> From<[T; N]> for AddressList {
    fn from(items: [T; N]) -> Self {
        AddressList::Items(items.into_iter().map(Into::into).collect())
    }
}

/// Canonical form every address takes once past the normalizer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedAddress {
    pub name: Option<String>,
    pub address: String,
}

impl NormalizedAddress {
    /// Convert into a lettre mailbox for header and envelope use
    pub fn to_mailbox(&self) -> MailResult<Mailbox> {
        let email = Address::from_str(&self.address)
            .map_err(|e| MailError::InvalidAddress(format!("\"{}\": {}", self.address, e)))?;
        Ok(Mailbox::new(self.name.clone(), email))
    }

    /// Domain part of the address.
    ///
    /// Never empty for a value returned by [`normalize`]. The fields are
    /// public, so a hand-built value without `@` yields `""`.
    pub fn domain(&self) -> &str {
        self.address
            .rsplit_once('@')
            .map(|(_, domain)| domain)
            .unwrap_or("")
    }
}

impl fmt::Display for NormalizedAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{} <{}>", name, self.address),
            None => write!(f, "{}", self.address),
        }
    }
}

fn is_valid_address_str(address: &str) -> bool {
    !address.is_empty() && MAIL_ADDRESS_REGEX.is_match(address)
}

/// Check whether an address input has an acceptable shape
pub fn validate(input: &AddressInput) -> bool {
    is_valid_address_str(input.address())
}

/// Turn a single input into its canonical `(name, address)` form
pub fn normalize(input: &AddressInput) -> MailResult<NormalizedAddress> {
    if !validate(input) {
        return Err(MailError::InvalidAddress(format!("\"{}\"", input)));
    }

    let normalized = match input {
        AddressInput::Bare(address) => NormalizedAddress {
            name: None,
            address: address.clone(),
        },
        AddressInput::Named(name, address) => NormalizedAddress {
            name: name.clone().filter(|n| !n.trim().is_empty()),
            address: address.clone(),
        },
    };

    Ok(normalized)
}

/// Normalize every element of a list, preserving order and duplicates.
///
/// The first invalid element fails the whole list.
pub fn normalize_list(addresses: &AddressList) -> MailResult<Vec<NormalizedAddress>> {
    addresses.to_inputs().iter().map(normalize).collect()
}
