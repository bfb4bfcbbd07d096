use crate::error::Result;
use crate::transport::{Connector, Listing};

/// collect every file path reachable from `start`
///
/// depth-first in listing order. child paths are `parent + "/" + name`,
/// so a scan from `""` yields paths with a leading slash. empty
/// directories contribute nothing; any listing error aborts the scan.
pub fn scan(connector: &mut dyn Connector, start: &str) -> Result<Vec<String>> {
    let mut collected = Vec::new();
    scan_into(connector, start, &mut collected)?;
    Ok(collected)
}

fn scan_into(connector: &mut dyn Connector, path: &str, collected: &mut Vec<String>) -> Result<()> {
    match connector.list_entries(path)? {
        Listing::Leaf => {
            log::debug!("found file in the source repository: {}", path);
            collected.push(path.to_string());
        }
        Listing::Entries(names) => {
            for name in names {
                let child = format!("{}/{}", path, name);
                scan_into(connector, &child, collected)?;
            }
        }
    }
    Ok(())
}
