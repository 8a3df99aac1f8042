//! Threat knowledge corpus: built-in flow-level reference notes, or a JSON file.

use super::RetrievalError;
use std::path::Path;

const THREAT_DOCS: &[&str] = &[
    "Benign traffic baseline: most flows are normal. Short DNS queries on UDP port 53, \
     stable RDP sessions on 3389, HTTPS browsing on 443, moderate packet and byte counts, \
     long steady flows without bursts. Without strong attack evidence classify benign; \
     false positives cost more than false negatives.",
    "DoS (denial of service): a single source overwhelms one target. Indicators: extremely \
     high packets or bytes per second, very long or continuous flows, the same source \
     repeatedly hitting one destination. A small or brief spike is likely benign. \
     MITRE T1499. Label: DoS.",
    "DDoS (distributed denial of service): many sources flood one victim. Indicators: \
     massive packets or bytes per second, many very short repeated flows to the same \
     destination port, SYN or UDP flood patterns. Popular sites also see high volume, so \
     look for sustained abnormal spikes. MITRE T1498. Label: DDoS.",
    "SSH brute force: repeated login attempts against destination port 22. Indicators: \
     many short connections, small packets, rapid reconnects from the same source. One \
     long SSH session is normal. MITRE T1110. Label: SSH Brute Force.",
    "FTP brute force: repeated authentication attempts against destination port 21. \
     Indicators: many short flows, the same source, rapid repeated connections. Normal \
     FTP transfers are long with high byte counts. MITRE T1110. Label: FTP Brute Force.",
    "Web attack, SQL injection: malicious SQL payloads to web servers on ports 80 or 443. \
     Indicators: many short HTTP requests, abnormal request frequency, small packet bursts, \
     repeated short connections with little data. MITRE T1190. Label: SQL Injection.",
    "Web attack, cross site scripting (XSS): scripts injected into web requests. \
     Indicators: many tiny HTTP flows to the same server, rapid repeated sessions, abnormal \
     request bursts. Normal browsing has longer varied flows. MITRE T1059. Label: XSS.",
    "Web attack, command injection: OS commands executed through a web application. \
     Indicators: repeated short HTTP sessions and request bursts followed by larger \
     outbound traffic. MITRE T1203. Label: Command Injection.",
    "Infiltration and lateral movement: a compromised internal host spreading inside the \
     network. Indicators: internal-to-internal communication, access to many hosts and \
     service ports, irregular movement. Normal clients talk to few servers. MITRE T1021. \
     Label: Infiltration.",
    "Botnet activity: a compromised host talking to command and control. Indicators: \
     periodic beaconing at regular intervals, small consistent packet sizes, long-running \
     background connections to external addresses. Normal traffic is irregular. \
     MITRE T1071. Label: Botnet.",
    "Port scanning and reconnaissance: probing many ports to discover services. \
     Indicators: many short connections with very low byte counts across many different \
     destination ports, sequential or random probing. Normal clients reuse a few ports. \
     MITRE T1046. Label: PortScan.",
];

pub fn default_corpus() -> Vec<String> {
    THREAT_DOCS.iter().map(|d| d.to_string()).collect()
}

/// Read a JSON array of strings.
pub fn load_corpus(path: &Path) -> Result<Vec<String>, RetrievalError> {
    let data = std::fs::read_to_string(path)
        .map_err(|e| RetrievalError::Corpus(format!("{}: {}", path.display(), e)))?;
    serde_json::from_str::<Vec<String>>(&data)
        .map_err(|e| RetrievalError::Corpus(format!("{}: {}", path.display(), e)))
}
