use std::{collections::HashMap, fmt};

/// DNS names holding the TXT records of each VPC resource
///
/// Published as `name=value` TXT records on the bare VPC domain, e.g.
/// `subnets=subnets` maps the `subnets` resource to `subnets.<domain>`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Endpoints(HashMap<String, String>);

impl Endpoints {
    /// Build the map from TXT records; a record without `=` maps a name to itself
    pub fn from_records<S: AsRef<str>>(records: &[S]) -> Self {
        let endpoints = records
            .iter()
            .map(|record| {
                let record = record.as_ref();
                let (name, value) = record.split_once('=').unwrap_or((record, record));
                (name.to_string(), value.to_string())
            })
            .collect();

        Self(endpoints)
    }

    /// DNS name to query for `resource`
    pub fn get(&self, resource: &str) -> Option<&str> {
        self.0.get(resource).map(String::as_str)
    }
}

impl fmt::Display for Endpoints {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} endpoint(s)", self.0.len())
    }
}
