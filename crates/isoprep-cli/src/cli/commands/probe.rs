//! `isoprep probe <url>` – HEAD request summary.

use anyhow::Result;
use isoprep_core::fetch_head;

pub fn run_probe(url: &str) -> Result<()> {
    let head = fetch_head::probe(url, fetch_head::PROBE_TIMEOUT)?;
    let or_dash = |v: &Option<String>| v.clone().unwrap_or_else(|| "-".to_string());
    println!("URL:            {}", url);
    println!("Status:         {}", head.status);
    println!(
        "Content-Length: {}",
        head.content_length
            .map(|n| n.to_string())
            .unwrap_or_else(|| "-".to_string())
    );
    println!("Content-Type:   {}", or_dash(&head.content_type));
    println!("ETag:           {}", or_dash(&head.etag));
    println!("Last-Modified:  {}", or_dash(&head.last_modified));
    if !head.is_success() {
        anyhow::bail!("{} is not reachable (HTTP {})", url, head.status);
    }
    Ok(())
}
