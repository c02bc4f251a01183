//! Field validators shared by the provider records

use std::net::Ipv4Addr;

/// Longest cluster name; names end up in DNS labels and resource names
const MAX_CLUSTER_NAME: usize = 63;

/// Cluster names are lowercase DNS labels
pub(crate) fn cluster_name(value: &str, _ctx: &()) -> garde::Result {
    if value.is_empty() || value.len() > MAX_CLUSTER_NAME {
        return Err(garde::Error::new(format!(
            "length must be between 1 and {MAX_CLUSTER_NAME}"
        )));
    }
    let valid_chars = value
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if !valid_chars || value.starts_with('-') || value.ends_with('-') {
        return Err(garde::Error::new(
            "must contain only lowercase letters, digits and '-', and not start or end with '-'",
        ));
    }
    Ok(())
}

/// An IPv4 CIDR block, or empty when unset
pub(crate) fn optional_cidr(value: &str, _ctx: &()) -> garde::Result {
    if value.is_empty() {
        return Ok(());
    }
    let valid = value.split_once('/').is_some_and(|(addr, prefix)| {
        addr.parse::<Ipv4Addr>().is_ok() && prefix.parse::<u8>().is_ok_and(|p| p <= 32)
    });
    if valid {
        Ok(())
    } else {
        Err(garde::Error::new(format!("'{value}' is not an IPv4 CIDR block")))
    }
}
