//! Decoding of `pg_database.datacl`.
//!
//! The column is an `aclitem[]` read as text, e.g.
//! `{=Tc/postgres,postgres=CTc/postgres,django=c/postgres}`. Each item is
//! `grantee=privileges/grantor`; an empty grantee is PUBLIC and a `*` after a
//! letter marks the grant option.

use std::collections::BTreeSet;

/// Privileges held by `user` according to a database ACL.
///
/// A NULL ACL (default privileges only) or a user without an entry gives an
/// empty set.
pub fn database_privileges(datacl: Option<&str>, user: &str) -> BTreeSet<String> {
    let datacl = match datacl {
        Some(datacl) => datacl,
        None => return BTreeSet::new(),
    };

    split_items(datacl)
        .iter()
        .filter_map(|item| grantee_and_privileges(item))
        .filter(|(grantee, _)| grantee == user)
        .flat_map(|(_, letters)| letters.chars().filter_map(privilege_name).collect::<Vec<_>>())
        .map(str::to_string)
        .collect()
}

fn privilege_name(letter: char) -> Option<&'static str> {
    match letter {
        'C' => Some("CREATE"),
        'T' => Some("TEMPORARY"),
        'c' => Some("CONNECT"),
        _ => None,
    }
}

/// Split the array text into items, removing array-level quoting.
fn split_items(datacl: &str) -> Vec<String> {
    let body = datacl.trim();
    let body = body.strip_prefix('{').unwrap_or(body);
    let body = body.strip_suffix('}').unwrap_or(body);

    let mut items = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' if quoted => {
                if let Some(escaped) = chars.next() {
                    current.push(escaped);
                }
            }
            '"' => quoted = !quoted,
            ',' if !quoted => items.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    if !current.is_empty() {
        items.push(current);
    }

    items
}

/// Split `grantee=letters/grantor`, unquoting the grantee.
fn grantee_and_privileges(item: &str) -> Option<(String, &str)> {
    let (grantee, rest) = match item.strip_prefix('"') {
        Some(quoted) => {
            let mut grantee = String::new();
            let mut end = None;
            let mut chars = quoted.char_indices().peekable();
            while let Some((i, c)) = chars.next() {
                if c != '"' {
                    grantee.push(c);
                } else if matches!(chars.peek(), Some((_, '"'))) {
                    chars.next();
                    grantee.push('"');
                } else {
                    end = Some(i + 1);
                    break;
                }
            }
            (grantee, &quoted[end?..])
        }
        None => {
            let eq = item.find('=')?;
            (item[..eq].to_string(), &item[eq..])
        }
    };

    let rest = rest.strip_prefix('=')?;
    let letters = rest.split_once('/').map_or(rest, |(letters, _)| letters);

    Some((grantee, letters))
}
