//! Last.fm is a scraper, not a `Client` — it has no `get_downloadable`
//! and exists only to feed `(artist, title)` pairs into
//! `PendingLastfmPlaylist::resolve`, which then asks a real source's
//! `search_take_first` to find a playable match (spec.md §2 item 6, §9).

use scraper::{Html, Selector};

use crate::error::{AppError, Result};

pub struct LastfmScraper {
    http: reqwest::Client,
}

/// One playlist entry as named by Last.fm; not yet matched to any source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastfmEntry {
    pub artist: String,
    pub title: String,
}

impl LastfmScraper {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    pub async fn scrape_playlist(&self, url: &str) -> Result<Vec<LastfmEntry>> {
        let resp = self.http.get(url).send().await?;
        if !resp.status().is_success() {
            return Err(AppError::UrlParsing(format!(
                "last.fm playlist page returned http {}",
                resp.status()
            )));
        }
        let body = resp.text().await?;
        Ok(parse_playlist_page(&body))
    }
}

/// Extracts `(artist, title)` pairs from a last.fm chart/playlist page's
/// track table markup (`tr.chartlist-row`, `.chartlist-artist`/`.chartlist-name`).
fn parse_playlist_page(html: &str) -> Vec<LastfmEntry> {
    let document = Html::parse_document(html);
    let row_sel = Selector::parse("tr.chartlist-row").expect("valid selector");
    let artist_sel = Selector::parse(".chartlist-artist a").expect("valid selector");
    let title_sel = Selector::parse(".chartlist-name a").expect("valid selector");

    document
        .select(&row_sel)
        .filter_map(|row| {
            let artist = row.select(&artist_sel).next()?.text().collect::<String>();
            let title = row.select(&title_sel).next()?.text().collect::<String>();
            let artist = artist.trim().to_string();
            let title = title.trim().to_string();
            if artist.is_empty() || title.is_empty() {
                None
            } else {
                Some(LastfmEntry { artist, title })
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_entries_from_chartlist_rows() {
        let html = r#"
            <table>
              <tr class="chartlist-row">
                <td class="chartlist-artist"><a>Boards of Canada</a></td>
                <td class="chartlist-name"><a>Roygbiv</a></td>
              </tr>
              <tr class="chartlist-row">
                <td class="chartlist-artist"><a>Burial</a></td>
                <td class="chartlist-name"><a>Archangel</a></td>
              </tr>
            </table>
        "#;
        let entries = parse_playlist_page(html);
        assert_eq!(
            entries,
            vec![
                LastfmEntry { artist: "Boards of Canada".to_string(), title: "Roygbiv".to_string() },
                LastfmEntry { artist: "Burial".to_string(), title: "Archangel".to_string() },
            ]
        );
    }

    #[test]
    fn rows_missing_either_field_are_skipped() {
        let html = r#"
            <table>
              <tr class="chartlist-row">
                <td class="chartlist-artist"><a>Only Artist</a></td>
              </tr>
            </table>
        "#;
        assert!(parse_playlist_page(html).is_empty());
    }
}
