use crate::error::{Error, Result};
use crate::types::{endpoint_regex, Endpoint};
use rand::seq::SliceRandom;
use std::collections::HashSet;
use std::fs;
use std::io::{self, Read};
use std::path::Path;
use tracing::info;

/// Every endpoint URI appearing anywhere in `text`, first occurrence kept.
///
/// Works on plain one-per-line lists as well as the markdown tables public
/// peer directories publish.
pub fn scrape(text: &str) -> Vec<Endpoint> {
    let mut seen = HashSet::new();
    endpoint_regex()
        .find_iter(text)
        .map(|m| m.as_str())
        .filter(|uri| seen.insert(*uri))
        .map(Endpoint::from)
        .collect()
}

/// Reads candidates from a file, or from stdin when `source` is `-`.
pub fn load(source: &Path) -> Result<Vec<Endpoint>> {
    let read_err = |e: io::Error| Error::CandidatesRead {
        path: source.to_path_buf(),
        source: e,
    };
    let text = if source == Path::new("-") {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf).map_err(read_err)?;
        buf
    } else {
        fs::read_to_string(source).map_err(read_err)?
    };

    let candidates = scrape(&text);
    if candidates.is_empty() {
        return Err(Error::NoCandidates);
    }
    info!("Loaded {} candidate peers from {}", candidates.len(), source.display());
    Ok(candidates)
}

/// Random subset of at most `limit` candidates.
pub fn sample(mut candidates: Vec<Endpoint>, limit: usize) -> Vec<Endpoint> {
    candidates.shuffle(&mut rand::thread_rng());
    candidates.truncate(limit);
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scrapes_markdown_peer_list() {
        let text = "\
# Germany

* Hosted by example, 1 Gbit/s
  * `tcp://de1.example.net:7743`
  * `tls://de1.example.net:7744`
  * `tls://[2a01:4f8:1:2::3]:7744`
* Duplicate mention: tcp://de1.example.net:7743
* Unsupported: socks://proxy.example:1080 and http://example.org
";
        let found = scrape(text);
        let uris: Vec<&str> = found.iter().map(|e| e.as_str()).collect();
        assert_eq!(
            uris,
            vec![
                "tcp://de1.example.net:7743",
                "tls://de1.example.net:7744",
                "tls://[2a01:4f8:1:2::3]:7744",
            ]
        );
    }

    #[test]
    fn sample_respects_limit() {
        let all: Vec<Endpoint> = (0..50)
            .map(|i| Endpoint::from(format!("tcp://10.0.0.{}:1", i)))
            .collect();

        let picked = sample(all.clone(), 10);
        assert_eq!(picked.len(), 10);
        let distinct: HashSet<_> = picked.iter().collect();
        assert_eq!(distinct.len(), 10);
        assert!(picked.iter().all(|p| all.contains(p)));

        assert_eq!(sample(all.clone(), 500).len(), 50);
    }

    #[test]
    fn load_reads_file_and_rejects_empty() {
        let dir = tempfile::tempdir().unwrap();
        let list = dir.path().join("peers.txt");
        fs::write(&list, "tcp://a.example:1\nquic://b.example:2\n").unwrap();
        assert_eq!(load(&list).unwrap().len(), 2);

        let empty = dir.path().join("empty.txt");
        fs::write(&empty, "nothing to see\n").unwrap();
        assert!(matches!(load(&empty), Err(Error::NoCandidates)));

        assert!(matches!(
            load(&dir.path().join("absent.txt")),
            Err(Error::CandidatesRead { .. })
        ));
    }
}
