use ipnetwork::IpNetwork;

use crate::error::VpcError;

/// Mutable binding of a record field, as handed out by [`Record::field`]
#[derive(Debug)]
pub enum Field<'a> {
    /// Plain text, stored as given
    Text(&'a mut String),
    /// CIDR block such as `10.30.0.0/19`
    Cidr(&'a mut Option<IpNetwork>),
}

/// Structured record decoded from a `key=value&key=value` string
pub trait Record: Default {
    /// Return the field bound to `tag`, or `None` for keys the record ignores
    fn field(&mut self, tag: &str) -> Option<Field<'_>>;
}

/// Parse a TXT record string into a structured record
///
/// The string is form-encoded (`key=value` pairs joined by `&`, values may be
/// percent-encoded). Keys the record does not declare are ignored; when a key
/// appears more than once the last value wins.
///
/// # Arguments
/// * `input` - Record string such as `subnet=subnet-752a9602&cidr=10.30.0.0/19&zone=us-west-2a`
///
/// # Returns
/// * `Ok(R)` - The populated record
/// * `Err(VpcError)` - If a declared field holds a value of the wrong shape
///
/// # Examples
/// ```
/// use vpcinfo::net::{Subnet, parser::parse_record};
///
/// let subnet: Subnet = parse_record("subnet=subnet-752a9602&cidr=10.30.0.0/19&zone=us-west-2a").unwrap();
/// assert_eq!(subnet.zone, "us-west-2a");
/// ```
pub fn parse_record<R: Record>(input: &str) -> Result<R, VpcError> {
    let mut record = R::default();

    for (key, value) in url::form_urlencoded::parse(input.as_bytes()) {
        let Some(field) = record.field(&key) else {
            continue;
        };

        match field {
            Field::Text(text) => *text = value.into_owned(),
            Field::Cidr(cidr) => {
                *cidr = Some(parse_cidr(&value).map_err(|reason| VpcError::InvalidRecord {
                    record: input.to_string(),
                    reason: format!("{key}: {reason}"),
                })?);
            }
        }
    }

    Ok(record)
}

/// Parse a CIDR block, normalized to its network address
fn parse_cidr(input: &str) -> Result<IpNetwork, String> {
    if !input.contains('/') {
        return Err(format!("missing prefix length in CIDR block '{input}'"));
    }

    let network = input
        .parse::<IpNetwork>()
        .map_err(|err| format!("invalid CIDR block '{input}': {err}"))?;

    IpNetwork::new(network.network(), network.prefix())
        .map_err(|err| format!("invalid CIDR block '{input}': {err}"))
}
