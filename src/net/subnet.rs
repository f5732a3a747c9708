use std::{
    collections::HashSet,
    fmt,
    net::{IpAddr, SocketAddr},
    ops::Deref,
};

use ipnetwork::IpNetwork;

use super::parser::{Field, Record};

/// Subnet of the VPC, as published in the `subnets` TXT records
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Subnet {
    pub id: String,
    pub zone: String,
    pub cidr: Option<IpNetwork>,
}

impl Subnet {
    pub fn contains(&self, ip: IpAddr) -> bool {
        self.cidr.is_some_and(|cidr| cidr.contains(ip))
    }
}

impl Record for Subnet {
    fn field(&mut self, tag: &str) -> Option<Field<'_>> {
        match tag {
            "subnet" => Some(Field::Text(&mut self.id)),
            "zone" => Some(Field::Text(&mut self.zone)),
            "cidr" => Some(Field::Cidr(&mut self.cidr)),
            _ => None,
        }
    }
}

/// Formats the subnet in its TXT record form
impl fmt::Display for Subnet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "subnet={}", self.id)?;
        if let Some(cidr) = &self.cidr {
            write!(f, "&cidr={cidr}")?;
        }
        write!(f, "&zone={}", self.zone)
    }
}

/// Ordered list of subnets
///
/// Lookups return the first subnet containing the address, so more specific
/// blocks must come before the blocks enclosing them.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Subnets(Vec<Subnet>);

impl Subnets {
    pub fn new(subnets: Vec<Subnet>) -> Self {
        Self(subnets)
    }

    /// Return the subnet that `ip` belongs to
    pub fn lookup_ip(&self, ip: IpAddr) -> Option<&Subnet> {
        self.0.iter().find(|subnet| subnet.contains(ip))
    }

    /// Return the subnet that the IP of `addr` belongs to
    pub fn lookup_addr(&self, addr: SocketAddr) -> Option<&Subnet> {
        self.lookup_ip(addr.ip())
    }

    /// Number of distinct zones the subnets are spread over
    pub fn zone_count(&self) -> usize {
        self.0
            .iter()
            .map(|subnet| subnet.zone.as_str())
            .collect::<HashSet<_>>()
            .len()
    }
}

impl Deref for Subnets {
    type Target = [Subnet];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl FromIterator<Subnet> for Subnets {
    fn from_iter<I: IntoIterator<Item = Subnet>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Human-readable summary, used in log lines
impl fmt::Display for Subnets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "list of {} subnet(s) in {} zone(s)",
            self.0.len(),
            self.zone_count()
        )
    }
}
