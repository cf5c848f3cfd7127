//! Service and version enumeration through nmap's XML report.

use crate::output::schema::{
    HostAddress, HostName, NormalizedResult, OsMatch, Parsed, ServiceHost, ServicePort,
    ServiceResult,
};
use crate::plugins::options::ScanOptions;
use crate::plugins::types::{ToolAdapter, ToolBinding};
use regex::Regex;
use roxmltree::{Document, Node, ParsingOptions};
use std::sync::OnceLock;

#[derive(Debug, Clone)]
pub struct NmapAdapter {
    binding: ToolBinding,
}

impl NmapAdapter {
    pub fn new(binding: ToolBinding) -> Self {
        Self { binding }
    }
}

fn scan_flag(scan_type: &str) -> Option<&'static str> {
    match scan_type {
        "version" => Some("-sV"),
        "aggressive" => Some("-A"),
        "quick" => Some("-F"),
        "stealth" => Some("-sS"),
        _ => None,
    }
}

impl ToolAdapter for NmapAdapter {
    fn binding(&self) -> &ToolBinding {
        &self.binding
    }

    fn build_command(&self, target: &str, options: &ScanOptions) -> Vec<String> {
        let mut args = self.binding.launcher();

        let scan_type = options
            .non_empty("scan_type")
            .unwrap_or_else(|| "version".to_string());
        match scan_flag(&scan_type) {
            Some(flag) => args.push(flag.to_string()),
            None => tracing::debug!(scan_type = %scan_type, "unknown nmap scan_type, no scan flag added"),
        }

        if let Some(ports) = options.non_empty("ports") {
            args.extend(["-p".to_string(), ports]);
        }

        args.extend(["-oX".to_string(), "-".to_string()]);
        args.push(target.to_string());
        args
    }

    fn parse_output(&self, stdout: &str, _stderr: &str) -> Parsed {
        match parse_xml(stdout) {
            Ok(hosts) => Parsed::full(NormalizedResult::Services(ServiceResult {
                host_count: hosts.len(),
                hosts,
            })),
            Err(e) => {
                tracing::debug!("nmap XML unreadable ({}), scanning text instead", e);
                Parsed::degraded(parse_text(stdout))
            }
        }
    }
}

fn attr(node: Node<'_, '_>, name: &str) -> String {
    node.attribute(name).unwrap_or_default().to_string()
}

fn child<'a, 'i>(node: Node<'a, 'i>, name: &str) -> Option<Node<'a, 'i>> {
    node.children().find(|n| n.has_tag_name(name))
}

fn children<'a, 'i>(node: Node<'a, 'i>, name: &'a str) -> impl Iterator<Item = Node<'a, 'i>> + 'a
where
    'i: 'a,
{
    node.children().filter(move |n| n.has_tag_name(name))
}

fn parse_xml(text: &str) -> Result<Vec<ServiceHost>, roxmltree::Error> {
    // nmap emits `<!DOCTYPE nmaprun>`
    let options = ParsingOptions {
        allow_dtd: true,
        ..ParsingOptions::default()
    };
    let doc = Document::parse_with_options(text, options)?;

    let hosts = children(doc.root_element(), "host")
        .map(|host| ServiceHost {
            status: child(host, "status")
                .and_then(|s| s.attribute("state"))
                .unwrap_or("unknown")
                .to_string(),
            addresses: children(host, "address")
                .map(|a| HostAddress {
                    addr: attr(a, "addr"),
                    addr_type: attr(a, "addrtype"),
                })
                .collect(),
            hostnames: child(host, "hostnames")
                .map(|names| {
                    children(names, "hostname")
                        .map(|h| HostName {
                            name: attr(h, "name"),
                            name_type: attr(h, "type"),
                        })
                        .collect()
                })
                .unwrap_or_default(),
            ports: child(host, "ports")
                .map(|ports| children(ports, "port").map(service_port).collect())
                .unwrap_or_default(),
            os: child(host, "os")
                .map(|os| {
                    children(os, "osmatch")
                        .map(|m| OsMatch {
                            name: attr(m, "name"),
                            accuracy: attr(m, "accuracy"),
                        })
                        .collect()
                })
                .unwrap_or_default(),
        })
        .collect();

    Ok(hosts)
}

fn service_port(port: Node<'_, '_>) -> ServicePort {
    let state = child(port, "state");
    let service = child(port, "service");
    let service_attr = |name: &str| service.map(|s| attr(s, name)).unwrap_or_default();

    ServicePort {
        port: port
            .attribute("portid")
            .and_then(|p| p.parse().ok())
            .unwrap_or(0),
        protocol: port.attribute("protocol").unwrap_or("tcp").to_string(),
        state: state.map(|s| attr(s, "state")).unwrap_or_default(),
        service: service_attr("name"),
        version: service_attr("version"),
        product: service_attr("product"),
    }
}

/// Recovers port lines from nmap's normal text report. Everything lands in a
/// single anonymous host since the text carries no reliable host boundaries.
fn parse_text(text: &str) -> NormalizedResult {
    static PORT_LINE: OnceLock<Regex> = OnceLock::new();
    let re = PORT_LINE.get_or_init(|| {
        Regex::new(r"(\d+)/(tcp|udp)\s+(\w+)\s+(\S+)(?:\s+(.*))?").expect("static regex")
    });

    let ports: Vec<ServicePort> = text
        .lines()
        .filter_map(|line| re.captures(line))
        .filter_map(|cap| {
            Some(ServicePort {
                port: cap[1].parse().ok()?,
                protocol: cap[2].to_string(),
                state: cap[3].to_string(),
                service: cap[4].to_string(),
                version: cap
                    .get(5)
                    .map(|m| m.as_str().trim().to_string())
                    .unwrap_or_default(),
                product: String::new(),
            })
        })
        .collect();

    let hosts = if ports.is_empty() {
        Vec::new()
    } else {
        vec![ServiceHost {
            status: "unknown".to_string(),
            addresses: Vec::new(),
            hostnames: Vec::new(),
            ports,
            os: Vec::new(),
        }]
    };

    NormalizedResult::Services(ServiceResult {
        host_count: hosts.len(),
        hosts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::ToolId;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use std::time::Duration;

    const REPORT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE nmaprun>
<?xml-stylesheet href="file:///usr/share/nmap/nmap.xsl" type="text/xsl"?>
<nmaprun scanner="nmap" args="nmap -sV -oX - 10.0.0.1" version="7.94">
<host starttime="1700000000" endtime="1700000010">
  <status state="up" reason="syn-ack"/>
  <address addr="10.0.0.1" addrtype="ipv4"/>
  <address addr="00:11:22:33:44:55" addrtype="mac"/>
  <hostnames><hostname name="gw.lan" type="PTR"/></hostnames>
  <ports>
    <extraports state="closed" count="998"/>
    <port protocol="tcp" portid="22"><state state="open" reason="syn-ack"/><service name="ssh" product="OpenSSH" version="9.6p1"/></port>
    <port protocol="tcp" portid="80"><state state="open" reason="syn-ack"/></port>
  </ports>
  <os><osmatch name="Linux 5.X" accuracy="96"/></os>
</host>
<host><status state="down"/><address addr="10.0.0.2" addrtype="ipv4"/></host>
<runstats><finished time="1700000010" elapsed="10.00"/></runstats>
</nmaprun>
"#;

    fn adapter() -> NmapAdapter {
        NmapAdapter::new(ToolBinding::new(
            ToolId::Nmap,
            "/usr/bin/nmap",
            Duration::from_secs(600),
        ))
    }

    fn services(parsed: &Parsed) -> &ServiceResult {
        match &parsed.result {
            NormalizedResult::Services(r) => r,
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[rstest]
    #[case("version", "-sV")]
    #[case("aggressive", "-A")]
    #[case("quick", "-F")]
    #[case("stealth", "-sS")]
    fn test_scan_type_flag(#[case] scan_type: &str, #[case] flag: &str) {
        let options = ScanOptions::new().with("scan_type", scan_type);
        let args = adapter().build_command("10.0.0.1", &options);
        assert_eq!(args, vec!["/usr/bin/nmap", flag, "-oX", "-", "10.0.0.1"]);
    }

    #[test]
    fn test_build_command_ports_and_target_last() {
        let options = ScanOptions::new().with("ports", "22,80-90");
        let args = adapter().build_command("scanme.nmap.org", &options);
        assert_eq!(
            args,
            vec!["/usr/bin/nmap", "-sV", "-p", "22,80-90", "-oX", "-", "scanme.nmap.org"]
        );
    }

    #[test]
    fn test_unknown_scan_type_adds_no_flag() {
        let options = ScanOptions::new().with("scan_type", "udp");
        let args = adapter().build_command("10.0.0.1", &options);
        assert_eq!(args, vec!["/usr/bin/nmap", "-oX", "-", "10.0.0.1"]);
    }

    #[test]
    fn test_parse_xml_report() {
        let parsed = adapter().parse_output(REPORT, "");
        assert!(!parsed.is_degraded());

        let result = services(&parsed);
        assert_eq!(result.host_count, 2);

        let host = &result.hosts[0];
        assert_eq!(host.status, "up");
        assert_eq!(host.addresses.len(), 2);
        assert_eq!(host.addresses[1].addr_type, "mac");
        assert_eq!(
            host.hostnames,
            vec![HostName {
                name: "gw.lan".to_string(),
                name_type: "PTR".to_string()
            }]
        );
        assert_eq!(
            host.ports[0],
            ServicePort {
                port: 22,
                protocol: "tcp".to_string(),
                state: "open".to_string(),
                service: "ssh".to_string(),
                version: "9.6p1".to_string(),
                product: "OpenSSH".to_string(),
            }
        );
        assert_eq!(host.ports[1].service, "");
        assert_eq!(host.os[0].accuracy, "96");

        let down = &result.hosts[1];
        assert_eq!(down.status, "down");
        assert!(down.ports.is_empty());
    }

    #[test]
    fn test_parse_text_fallback() {
        let stdout = "Nmap scan report for 10.0.0.1\nPORT   STATE SERVICE VERSION\n22/tcp open  ssh     OpenSSH 9.6p1\n53/udp open  domain\n";
        let parsed = adapter().parse_output(stdout, "");
        assert!(parsed.is_degraded());

        let result = services(&parsed);
        assert_eq!(result.host_count, 1);
        let ports = &result.hosts[0].ports;
        assert_eq!(ports.len(), 2);
        assert_eq!(ports[0].version, "OpenSSH 9.6p1");
        assert_eq!(ports[1].protocol, "udp");
        assert_eq!(ports[1].version, "");
    }

    #[test]
    fn test_parse_garbage_yields_empty_result() {
        let parsed = adapter().parse_output("Failed to resolve \"nope\".", "");
        assert!(parsed.is_degraded());
        assert_eq!(services(&parsed).host_count, 0);
    }
}
