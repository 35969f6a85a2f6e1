use crate::base::Error;

/// Header map preserving insertion order and original casing.
///
/// Lookup is case-insensitive per HTTP semantics. Request headers may hold
/// multiple values for a name via [`HeaderSet::append`], emitted in send
/// order. [`HeaderSet::set`] updates in place, which is what response
/// parsing uses so a duplicated response header resolves to its last value
/// while keeping the first occurrence's position.
#[derive(Debug, Clone, Default)]
pub struct HeaderSet {
    headers: Vec<(String, String)>,
}

impl HeaderSet {
    pub fn new() -> Self {
        Self {
            headers: Vec::new(),
        }
    }

    /// Set a header, replacing the value of an existing one in place.
    pub fn set(&mut self, name: &str, value: &str) -> Result<(), Error> {
        validate(name, value)?;
        if let Some((_, v)) = self
            .headers
            .iter_mut()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
        {
            *v = value.to_string();
        } else {
            self.headers.push((name.to_string(), value.to_string()));
        }
        Ok(())
    }

    /// Append a header, preserving any existing values for the same name.
    pub fn append(&mut self, name: &str, value: &str) -> Result<(), Error> {
        validate(name, value)?;
        self.headers.push((name.to_string(), value.to_string()));
        Ok(())
    }

    /// First value for `name` (case-insensitive).
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// All values for `name` in send order.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.headers
            .iter()
            .filter(move |(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn remove(&mut self, name: &str) {
        self.headers.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
    }

    pub(crate) fn clear(&mut self) {
        self.headers.clear();
    }

    /// All headers in send order with original casing.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }
}

fn validate(name: &str, value: &str) -> Result<(), Error> {
    let name_ok = !name.is_empty() && name.bytes().all(is_token_byte);
    let value_ok = value
        .bytes()
        .all(|b| b == b'\t' || (b != 0x7f && b >= 0x20));
    if name_ok && value_ok {
        Ok(())
    } else {
        Err(Error::InvalidHeader {
            name: name.to_string(),
        })
    }
}

// RFC 9110 token characters
fn is_token_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
}
