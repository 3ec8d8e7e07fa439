//! Station directory resolution
//!
//! UK-AIR publishes a network-wide metadata listing as CSV, reachable from
//! the "find sites" results page. The listing names every station that ever
//! reported to the network, with its operational dates and location, but
//! not the short code used in data file names. That code is read from a
//! `Site Code` column when present, otherwise from the data links on the
//! station's site-info page.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Datelike, NaiveDate};
use futures::stream::{self, StreamExt};
use scraper::{Html, Selector};
use tracing::{debug, info, warn};
use url::Url;

use crate::app::client::UkAirClient;
use crate::app::models::{
    display_normalize, DownloadCode, OperationalHistory, OperationalWindow, StationDescriptor,
};
use crate::constants::{listing, pipeline, selectors, ukair};
use crate::errors::{ResolveError, ResolveResult};

/// One station row of the metadata listing
///
/// The listing has one row per station per operational period, so
/// `history` holds a single period until [`select_active`] merges the rows
/// of a station.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingRow {
    pub site_id: String,
    pub eu_site_id: Option<String>,
    pub emep_site_id: Option<String>,
    pub site_name: String,
    pub environment_type: String,
    pub zone: String,
    pub networks: Option<String>,
    pub history: OperationalHistory,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub northing: Option<f64>,
    pub easting: Option<f64>,
    pub altitude: Option<f64>,
    pub download_code: Option<DownloadCode>,
}

/// Resolves the stations of one network active during a year range
#[derive(Debug, Clone)]
pub struct StationResolver {
    client: Arc<UkAirClient>,
    network: String,
    listing_url: String,
    site_info_path: String,
    lookup_concurrency: usize,
}

impl StationResolver {
    /// Create a resolver for a network name as written in the listing's
    /// `Networks` column (e.g. `AURN`); an empty name disables the filter
    pub fn new(client: Arc<UkAirClient>, network: impl Into<String>) -> Self {
        Self {
            client,
            network: network.into(),
            listing_url: ukair::METADATA_SEARCH.to_string(),
            site_info_path: ukair::SITE_INFO.to_string(),
            lookup_concurrency: pipeline::DEFAULT_WORKER_COUNT,
        }
    }

    /// Listing location: a path under the client's base URL or an absolute
    /// URL, pointing at the CSV or at an HTML page linking to it
    pub fn with_listing_url(mut self, listing_url: impl Into<String>) -> Self {
        self.listing_url = listing_url.into();
        self
    }

    /// Site-info path prefix, followed by the UK-AIR ID
    pub fn with_site_info_path(mut self, site_info_path: impl Into<String>) -> Self {
        self.site_info_path = site_info_path.into();
        self
    }

    /// Maximum concurrent site-info lookups
    pub fn with_lookup_concurrency(mut self, lookup_concurrency: usize) -> Self {
        self.lookup_concurrency = lookup_concurrency.max(1);
        self
    }

    /// Stations with an operational period intersecting `[start_year, end_year]`
    ///
    /// # Errors
    ///
    /// Returns `ResolveError::SourceUnavailable` if the listing cannot be
    /// retrieved and `ResolveError::MalformedListing` if it does not parse
    pub async fn resolve(
        &self,
        start_year: i32,
        end_year: i32,
    ) -> ResolveResult<Vec<StationDescriptor>> {
        let csv_text = self.fetch_listing().await?;
        let rows = parse_listing(&csv_text)?;
        let total = rows.len();
        let selected = select_active(rows, start_year, end_year, &self.network);
        info!(
            "Listing has {} rows, {} {} stations active in {}-{}",
            total,
            selected.len(),
            if self.network.is_empty() { "network" } else { self.network.as_str() },
            start_year,
            end_year
        );

        let descriptors: Vec<StationDescriptor> = stream::iter(selected)
            .map(|row| async move {
                let code = match row.download_code.clone() {
                    Some(code) => Some(code),
                    None => self.lookup_download_code(&row.site_id).await,
                };
                match code {
                    Some(code) => Some(self.describe(row, code)),
                    None => {
                        warn!(
                            "Skipping {} ({}): download code not found",
                            row.site_name, row.site_id
                        );
                        None
                    }
                }
            })
            .buffered(self.lookup_concurrency)
            .filter_map(|descriptor| async move { descriptor })
            .collect()
            .await;

        info!("Resolved {} stations", descriptors.len());
        Ok(descriptors)
    }

    /// Retrieve the listing CSV, following the results page link if needed
    async fn fetch_listing(&self) -> ResolveResult<String> {
        let url = self
            .client
            .url_for(&self.listing_url)
            .map_err(|e| unavailable(&self.listing_url, e))?;
        let body = self
            .client
            .get_page(&url)
            .await
            .map_err(|e| unavailable(url.as_str(), e))?;

        if !looks_like_html(&body) {
            return Ok(body);
        }

        let href = find_listing_link(&body).ok_or_else(|| ResolveError::MalformedListing {
            reason: format!("no CSV link ({}) on {}", selectors::LISTING_CSV_LINK, url),
        })?;
        let csv_url = url.join(&href).map_err(|e| unavailable(&href, e))?;
        debug!("Following listing link {}", csv_url);

        self.client
            .get_page(&csv_url)
            .await
            .map_err(|e| unavailable(csv_url.as_str(), e))
    }

    /// Read the download code from a station's site-info page
    async fn lookup_download_code(&self, site_id: &str) -> Option<DownloadCode> {
        let path = format!("{}{}", self.site_info_path, site_id);
        let url: Url = match self.client.url_for(&path) {
            Ok(url) => url,
            Err(e) => {
                warn!("Invalid site-info URL for {}: {}", site_id, e);
                return None;
            }
        };

        match self.client.get_page(&url).await {
            Ok(page) => find_download_code(&page),
            Err(e) => {
                warn!("Site-info lookup failed for {}: {}", site_id, e);
                None
            }
        }
    }

    fn describe(&self, row: ListingRow, download_code: DownloadCode) -> StationDescriptor {
        let network = if self.network.is_empty() {
            row.networks.unwrap_or_default()
        } else {
            self.network.clone()
        };
        StationDescriptor {
            site_id: row.site_id,
            eu_site_id: row.eu_site_id,
            emep_site_id: row.emep_site_id,
            site_name: row.site_name,
            network,
            environment_type: row.environment_type,
            zone: row.zone,
            latitude: row.latitude,
            longitude: row.longitude,
            northing: row.northing,
            easting: row.easting,
            altitude: row.altitude,
            download_code,
            history: row.history,
        }
    }
}

fn unavailable(url: &str, reason: impl std::fmt::Display) -> ResolveError {
    ResolveError::SourceUnavailable {
        url: url.to_string(),
        reason: reason.to_string(),
    }
}

fn looks_like_html(body: &str) -> bool {
    body.trim_start().starts_with('<')
}

/// Parse the listing CSV into rows
///
/// # Errors
///
/// Returns `ResolveError::MalformedListing` if required columns are missing
/// or the CSV cannot be read
pub fn parse_listing(text: &str) -> ResolveResult<Vec<ListingRow>> {
    let malformed = |reason: String| ResolveError::MalformedListing { reason };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| malformed(format!("unreadable header row: {}", e)))?
        .clone();
    let index: HashMap<String, usize> = headers
        .iter()
        .enumerate()
        .map(|(i, name)| (name.trim().to_ascii_lowercase(), i))
        .collect();
    let column = |name: &str| index.get(&name.to_ascii_lowercase()).copied();

    let missing: Vec<&str> = listing::REQUIRED
        .iter()
        .copied()
        .filter(|name| column(*name).is_none())
        .collect();
    if !missing.is_empty() {
        return Err(malformed(format!("missing columns {:?}", missing)));
    }

    let code_column = listing::DOWNLOAD_CODE_COLUMNS
        .iter()
        .find_map(|name| column(*name));

    let mut rows = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record.map_err(|e| malformed(format!("row {}: {}", line + 1, e)))?;
        let cell = |name: &str| {
            column(name)
                .and_then(|i| record.get(i))
                .map(display_normalize)
                .unwrap_or_default()
        };
        let optional = |name: &str| Some(cell(name)).filter(|v| !v.is_empty());

        let site_id = cell(listing::UK_AIR_ID);
        if site_id.is_empty() {
            debug!("Skipping listing row {} without a UK-AIR ID", line + 1);
            continue;
        }

        rows.push(ListingRow {
            site_id,
            eu_site_id: optional(listing::EU_SITE_ID),
            emep_site_id: optional(listing::EMEP_SITE_ID),
            site_name: cell(listing::SITE_NAME),
            environment_type: cell(listing::ENVIRONMENT_TYPE),
            zone: cell(listing::ZONE),
            networks: column(listing::NETWORKS).map(|_| cell(listing::NETWORKS)),
            history: OperationalWindow::new(
                parse_year(&cell(listing::START_DATE)),
                parse_year(&cell(listing::END_DATE)),
            )
            .into(),
            latitude: parse_number(&cell(listing::LATITUDE)),
            longitude: parse_number(&cell(listing::LONGITUDE)),
            northing: parse_number(&cell(listing::NORTHING)),
            easting: parse_number(&cell(listing::EASTING)),
            altitude: parse_number(&cell(listing::ALTITUDE)),
            download_code: code_column
                .and_then(|i| record.get(i))
                .and_then(DownloadCode::new),
        });
    }

    Ok(rows)
}

/// Year of a listing date; blank, `Unavailable` or unparsable cells are open
fn parse_year(cell: &str) -> Option<i32> {
    let date = cell.trim().get(..10)?;
    NaiveDate::parse_from_str(date, listing::DATE_FORMAT)
        .ok()
        .map(|d| d.year())
}

fn parse_number(cell: &str) -> Option<f64> {
    cell.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Keep network rows active in the range, one merged row per UK-AIR ID
///
/// The first active row of a station supplies its identity and location;
/// the periods of all its active rows are merged into its history.
pub fn select_active(
    rows: Vec<ListingRow>,
    start_year: i32,
    end_year: i32,
    network: &str,
) -> Vec<ListingRow> {
    let mut merged: Vec<ListingRow> = Vec::new();
    let mut position: HashMap<String, usize> = HashMap::new();

    for row in rows
        .into_iter()
        .filter(|row| in_network(row, network))
        .filter(|row| row.history.intersects(start_year, end_year))
    {
        match position.get(&row.site_id) {
            Some(&i) => {
                let station = &mut merged[i];
                for period in row.history.periods() {
                    station.history.push(*period);
                }
                if station.download_code.is_none() {
                    station.download_code = row.download_code;
                }
            }
            None => {
                position.insert(row.site_id.clone(), merged.len());
                merged.push(row);
            }
        }
    }

    merged
}

fn in_network(row: &ListingRow, network: &str) -> bool {
    if network.is_empty() {
        return true;
    }
    // Listings without a Networks column cannot be filtered
    row.networks
        .as_deref()
        .map_or(true, |networks| networks.contains(network))
}

/// `href` of the listing CSV link on a results page
pub fn find_listing_link(html: &str) -> Option<String> {
    let selector = Selector::parse(selectors::LISTING_CSV_LINK).ok()?;
    let document = Html::parse_document(html);
    document
        .select(&selector)
        .find_map(|element| element.value().attr("href"))
        .map(str::to_string)
}

/// Download code carried by a `site_id=` data link on a site-info page
pub fn find_download_code(html: &str) -> Option<DownloadCode> {
    let selector = Selector::parse(selectors::SITE_DATA_LINK).ok()?;
    let document = Html::parse_document(html);
    document
        .select(&selector)
        .filter_map(|element| element.value().attr("href"))
        .find_map(|href| {
            let (_, rest) = href.split_once(selectors::SITE_ID_PARAM)?;
            let value = rest.split(['&', '#']).next().unwrap_or_default();
            DownloadCode::new(value)
        })
}
