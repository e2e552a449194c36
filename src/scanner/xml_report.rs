//! Port-scanner XML topology parsing.
//!
//! Tools that emit a structured XML run document (nmap's `-oX -`) get a
//! concise host report alongside the raw artifact: host → status, open
//! ports, detected service. Text-format tools skip this entirely.

use roxmltree::{Document, Node};
use serde::Serialize;
use std::fmt;

use crate::error::{ScanError, ScanResult};

/// One scanned port inside a host entry.
#[derive(Debug, Clone, Serialize)]
pub struct PortEntry {
    pub port: u16,
    pub protocol: String,
    pub state: String,
    pub service: String,
}

/// One host from the XML topology.
#[derive(Debug, Clone, Serialize)]
pub struct HostEntry {
    pub address: String,
    pub state: String,
    pub ports: Vec<PortEntry>,
}

/// Concise report for one tool invocation against one target.
#[derive(Debug, Clone, Serialize)]
pub struct HostReport {
    pub target: String,
    pub hosts: Vec<HostEntry>,
}

/// Parse an XML run document into a host report.
pub fn parse(xml: &str, target: &str) -> ScanResult<HostReport> {
    let doc = Document::parse(xml).map_err(|e| ScanError::ReportParse(e.to_string()))?;

    let hosts = doc
        .descendants()
        .filter(|n| n.has_tag_name("host"))
        .map(parse_host)
        .collect();

    Ok(HostReport {
        target: target.to_string(),
        hosts,
    })
}

fn parse_host(host: Node) -> HostEntry {
    // Prefer an IP address entry; fall back to whatever address comes first.
    let mut address = String::from("unknown");
    for addr in host.children().filter(|n| n.has_tag_name("address")) {
        let value = addr.attribute("addr").unwrap_or_default();
        match addr.attribute("addrtype") {
            Some("ipv4") | Some("ipv6") => {
                address = value.to_string();
                break;
            }
            _ if address == "unknown" => address = value.to_string(),
            _ => {}
        }
    }

    let state = host
        .children()
        .find(|n| n.has_tag_name("status"))
        .and_then(|n| n.attribute("state"))
        .unwrap_or("unknown")
        .to_string();

    let ports = host
        .descendants()
        .filter(|n| n.has_tag_name("port"))
        .filter_map(parse_port)
        .collect();

    HostEntry {
        address,
        state,
        ports,
    }
}

fn parse_port(port: Node) -> Option<PortEntry> {
    let number: u16 = port.attribute("portid")?.parse().ok()?;
    let protocol = port.attribute("protocol").unwrap_or("tcp").to_string();

    let state = port
        .children()
        .find(|n| n.has_tag_name("state"))
        .and_then(|n| n.attribute("state"))
        .unwrap_or("unknown")
        .to_string();

    let service = port
        .children()
        .find(|n| n.has_tag_name("service"))
        .map(|n| {
            let name = n.attribute("name").unwrap_or_default();
            let product = n.attribute("product").unwrap_or_default();
            let version = n.attribute("version").unwrap_or_default();
            format!("{name} {product} {version}").trim().to_string()
        })
        .unwrap_or_default();

    Some(PortEntry {
        port: number,
        protocol,
        state,
        service,
    })
}

impl fmt::Display for HostReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Report for target: {}", self.target)?;
        writeln!(f, "====================================")?;

        if self.hosts.is_empty() {
            return writeln!(f, "No hosts returned (possible filter/host down).");
        }

        for host in &self.hosts {
            writeln!(f, "Host: {} (status={})", host.address, host.state)?;
            if host.ports.is_empty() {
                writeln!(f, "  no ports reported")?;
            } else {
                for p in &host.ports {
                    writeln!(
                        f,
                        "  - {}/{} -> {} (service={})",
                        p.port, p.protocol, p.state, p.service
                    )?;
                }
            }
        }

        Ok(())
    }
}
