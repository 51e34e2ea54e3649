//! A minimal parser for `key[=value]` query strings.
//!
//! This deliberately does not percent-decode anything: keys and values are
//! borrowed straight out of the query string, so a parsed [`QueryParams`]
//! cannot outlive the request it was parsed from.

/// The character separating parameters in a query string.
pub const DELIMITER: char = '&';

/// The default maximum number of parameters kept from a single query.
pub const MAX_PARAMS: usize = 8;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct QueryParam<'q> {
    pub key: &'q str,
    pub value: Option<&'q str>,
}

/// An ordered list of at most `MAX` parameters parsed from a query string.
#[derive(Clone, Debug, Default)]
pub struct QueryParams<'q, const MAX: usize = MAX_PARAMS> {
    params: heapless::Vec<QueryParam<'q>, MAX>,
}

impl<'q, const MAX: usize> QueryParams<'q, MAX> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            params: heapless::Vec::new(),
        }
    }

    /// Parses `query`, keeping at most `MAX` parameters.
    #[must_use]
    pub fn parse(query: &'q str) -> Self {
        Self::parse_with(query, DELIMITER, MAX)
    }

    /// Parses `query`, keeping at most `max_params` parameters (and never more
    /// than `MAX`).
    #[must_use]
    pub fn parse_max(query: &'q str, max_params: usize) -> Self {
        Self::parse_with(query, DELIMITER, max_params)
    }

    /// Parses `query`, splitting parameters on `delimiter` and keeping at most
    /// `max_params` of them.
    ///
    /// Parameters beyond the limit are dropped silently. A segment without an
    /// `=` becomes a parameter with no value; otherwise the value is
    /// everything after the first `=`.
    #[must_use]
    pub fn parse_with(query: &'q str, delimiter: char, max_params: usize) -> Self {
        let mut params = Self::new();
        if query.is_empty() {
            return params;
        }

        let max_params = max_params.min(MAX);
        for (i, segment) in query.split(delimiter).enumerate() {
            if i >= max_params {
                log::debug!("query has more than {max_params} params, ignoring the rest");
                break;
            }

            let param = match segment.split_once('=') {
                Some((key, value)) => QueryParam {
                    key,
                    value: Some(value),
                },
                None => QueryParam {
                    key: segment,
                    value: None,
                },
            };

            if params.params.push(param).is_err() {
                break;
            }
        }

        params
    }

    /// Returns the first parameter with the given key.
    #[must_use]
    pub fn find(&self, key: &str) -> Option<&QueryParam<'q>> {
        find(key, &self.params)
    }

    /// Returns the value of the first parameter with the given key, if that
    /// parameter exists and has a value.
    #[must_use]
    pub fn value(&self, key: &str) -> Option<&'q str> {
        self.find(key).and_then(|param| param.value)
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.find(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueryParam<'q>> + '_ {
        self.params.iter()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[QueryParam<'q>] {
        &self.params
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.params.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

/// First-match lookup of `key` in `params`.
#[must_use]
pub fn find<'p, 'q>(key: &str, params: &'p [QueryParam<'q>]) -> Option<&'p QueryParam<'q>> {
    params.iter().find(|param| param.key == key)
}
