#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::{TempDir, tempdir};

pub const LISTING_HEADERS: &str = "property_id,micro_market,project_name,developer_name,\
unit_size_sqft,configuration,ticket_price_cr,transaction_type,buyer_type,fiscal_quarter,\
connectivity_score,amenity_score,possession_status,sales_channel,nri_buyer,bedrooms,\
ticket_price_inr";

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes())
            .expect("write temp file contents");
        path
    }

    /// Writes a cleaned listing table of `rows` generated listings.
    pub fn write_listings(&self, name: &str, rows: usize) -> PathBuf {
        self.write(name, &listing_csv(rows))
    }
}

/// One cleaned listing line; deterministic in `i`.
pub fn listing_row(i: usize) -> String {
    let markets = ["Hebbal", "Whitefield", "Sarjapur"];
    let buyers = ["NRI", "HNI", "Corporate"];
    let price = 5.0 + i as f64 * 0.5;
    format!(
        "P{i:04},{market},Project {i},{developer},{size},{config},{price:.1},{transaction},\
{buyer},FY24-Q{quarter},7.5,8.0,{possession},{channel},{nri},{bedrooms},{inr:.1}",
        market = markets[i % 3],
        developer = if i % 2 == 0 { "Prestige" } else { "Sobha" },
        size = 2000 + i * 10,
        config = if i % 2 == 0 { "3BHK" } else { "4BHK" },
        transaction = if i % 2 == 0 { "Primary" } else { "Resale" },
        buyer = buyers[i % 3],
        quarter = i % 4 + 1,
        possession = if i % 2 == 0 {
            "Ready to Move"
        } else {
            "Under Construction"
        },
        channel = if i % 2 == 0 { "Broker" } else { "Direct" },
        nri = if i % 3 == 0 { "Yes" } else { "No" },
        bedrooms = 3 + i % 2,
        inr = price * 10_000_000.0,
    )
}

/// A cleaned listing CSV with a header and `rows` generated listings.
pub fn listing_csv(rows: usize) -> String {
    let mut csv = String::from(LISTING_HEADERS);
    csv.push('\n');
    for i in 0..rows {
        csv.push_str(&listing_row(i));
        csv.push('\n');
    }
    csv
}
