use std::fmt;

/// A reference string found in a payload: an absolute or relative address.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Locator(String);

impl Locator {
    /// Parses a reference string.
    ///
    /// Returns `None` for strings that cannot be a reference at all: empty,
    /// whitespace-only, or containing whitespace.
    pub fn parse(s: &str) -> Option<Self> {
        if s.is_empty() || s.chars().any(char::is_whitespace) {
            return None;
        }
        Some(Locator(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the scheme if the locator is absolute.
    ///
    /// A scheme is `ALPHA *( ALPHA / DIGIT / "+" / "-" / "." )` followed by `:`.
    pub fn scheme(&self) -> Option<&str> {
        let colon = self.0.find(':')?;
        let scheme = &self.0[..colon];
        let valid = !scheme.is_empty()
            && scheme.as_bytes()[0].is_ascii_alphabetic()
            && scheme
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'+' || b == b'-' || b == b'.');
        valid.then_some(scheme)
    }

    pub fn is_absolute(&self) -> bool {
        self.scheme().is_some()
    }

    /// Fragment-only locators (`#id`) point inside the containing record.
    pub fn is_fragment(&self) -> bool {
        self.0.starts_with('#')
    }

    /// The locator with any query string and fragment removed.
    pub fn path_part(&self) -> &str {
        let end = self.0.find(['?', '#']).unwrap_or(self.0.len());
        &self.0[..end]
    }

    /// If the locator lives under `base`, returns the remainder after it.
    ///
    /// Scheme and host are compared case-insensitively; the base must be
    /// followed by `/` or the end of the locator.
    pub fn strip_base(&self, base: &str) -> Option<&str> {
        let base = base.trim_end_matches('/');
        let head = self.0.get(..base.len())?;
        if !authority_eq(head, base) {
            return None;
        }
        let rest = &self.0[base.len()..];
        if rest.is_empty() || rest.starts_with('/') {
            Some(rest.trim_start_matches('/'))
        } else {
            None
        }
    }
}

/// Compares two base addresses, ignoring case in the scheme and host only.
fn authority_eq(a: &str, b: &str) -> bool {
    let split = |s: &str| -> usize {
        match s.find("://") {
            Some(pos) => {
                let host_start = pos + 3;
                s[host_start..]
                    .find('/')
                    .map(|p| host_start + p)
                    .unwrap_or(s.len())
            }
            None => 0,
        }
    };
    let (ia, ib) = (split(a), split(b));
    ia == ib && a[..ia].eq_ignore_ascii_case(&b[..ib]) && a[ia..] == b[ib..]
}

impl fmt::Debug for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Locator({})", self.0)
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Locator {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
