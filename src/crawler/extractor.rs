//! Detail page extractor
//!
//! This module turns the markup of a certification detail page into a
//! `Record`. Sections are located by the text of their table caption:
//! - Key-value sections pair every `th` with its next sibling `td`
//! - Row sections read one entry per table row, skipping the header row
//!
//! A section that cannot be found yields an empty map or list. Extraction
//! never fails.

use crate::config::SchemaConfig;
use crate::storage::{Factory, Record, RelatedCertificate};
use indexmap::IndexMap;
use scraper::{ElementRef, Html, Selector};

/// Captions of the four record sections and the identifier label
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailSchema {
    pub id_label: String,
    pub certification_caption: String,
    pub product_caption: String,
    pub factories_caption: String,
    pub related_caption: String,
}

impl From<&SchemaConfig> for DetailSchema {
    fn from(config: &SchemaConfig) -> Self {
        Self {
            id_label: config.id_label.clone(),
            certification_caption: config.certification_caption.clone(),
            product_caption: config.product_caption.clone(),
            factories_caption: config.factories_caption.clone(),
            related_caption: config.related_caption.clone(),
        }
    }
}

impl Default for DetailSchema {
    fn default() -> Self {
        Self::from(&SchemaConfig::default())
    }
}

/// Extracts records from detail page markup
#[derive(Debug, Clone, Default)]
pub struct DetailExtractor {
    schema: DetailSchema,
}

impl DetailExtractor {
    pub fn new(schema: DetailSchema) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &DetailSchema {
        &self.schema
    }

    /// Extracts a record from the markup of a detail page
    ///
    /// # Arguments
    ///
    /// * `markup` - Full HTML of the rendered detail page
    ///
    /// # Returns
    ///
    /// A record whose sections are empty wherever the page lacks them
    ///
    /// # Example
    ///
    /// ```
    /// use kc_certcrawl::crawler::DetailExtractor;
    ///
    /// let html = r#"<table><caption>인증정보 상세</caption>
    ///     <tr><th>인증번호</th><td>XU071234-21001A</td></tr></table>"#;
    /// let record = DetailExtractor::default().extract(html);
    /// assert_eq!(
    ///     record.certificate_number("인증번호"),
    ///     Some("xu071234-21001a".to_string())
    /// );
    /// ```
    pub fn extract(&self, markup: &str) -> Record {
        let document = Html::parse_document(markup);

        let certification_info = extract_key_values(&document, &self.schema.certification_caption);
        let product_info = extract_key_values(&document, &self.schema.product_caption);

        let factories = extract_rows::<3>(&document, &self.schema.factories_caption)
            .into_iter()
            .map(|[index, factory_name, country]| Factory {
                index,
                factory_name,
                country,
            })
            .collect();

        let related_certificates = extract_rows::<3>(&document, &self.schema.related_caption)
            .into_iter()
            .map(|[index, certificate_number, status]| RelatedCertificate {
                index,
                certificate_number,
                status,
            })
            .collect();

        Record {
            certification_info,
            product_info,
            factories,
            related_certificates,
        }
    }
}

/// Finds the table whose caption contains `caption_text`
fn find_section_table<'a>(document: &'a Html, caption_text: &str) -> Option<ElementRef<'a>> {
    let caption_selector = Selector::parse("caption").ok()?;

    let caption = document
        .select(&caption_selector)
        .find(|caption| caption.text().collect::<String>().contains(caption_text))?;

    caption
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|ancestor| ancestor.value().name() == "table")
}

/// Reads a label/value table into an ordered map
fn extract_key_values(document: &Html, caption_text: &str) -> IndexMap<String, String> {
    let mut values = IndexMap::new();

    let Some(table) = find_section_table(document, caption_text) else {
        tracing::debug!("Section '{}' not found", caption_text);
        return values;
    };
    let (Ok(row_selector), Ok(header_selector)) = (Selector::parse("tr"), Selector::parse("th"))
    else {
        return values;
    };

    for row in table.select(&row_selector) {
        for header in row.select(&header_selector) {
            let key = normalized_text(header);
            let value = header
                .next_siblings()
                .filter_map(ElementRef::wrap)
                .find(|sibling| sibling.value().name() == "td")
                .map(normalized_text)
                .unwrap_or_default();
            values.insert(key, value);
        }
    }

    values
}

/// Reads a repeated-row table, taking the first `N` cells of each data row
///
/// The first row is the header. Rows with fewer than `N` cells are skipped.
fn extract_rows<const N: usize>(document: &Html, caption_text: &str) -> Vec<[String; N]> {
    let mut rows = Vec::new();

    let Some(table) = find_section_table(document, caption_text) else {
        tracing::debug!("Section '{}' not found", caption_text);
        return rows;
    };
    let (Ok(row_selector), Ok(cell_selector), Ok(link_selector)) = (
        Selector::parse("tr"),
        Selector::parse("th, td"),
        Selector::parse("a"),
    ) else {
        return rows;
    };

    for row in table.select(&row_selector).skip(1) {
        let cells: Vec<ElementRef> = row.select(&cell_selector).collect();
        if cells.len() < N {
            continue;
        }

        let entry = std::array::from_fn(|i| {
            let cell = cells[i];
            match cell.select(&link_selector).next() {
                Some(link) => normalized_text(link),
                None => normalized_text(cell),
            }
        });
        rows.push(entry);
    }

    rows
}

/// Trims every text fragment of an element and concatenates them
fn normalized_text(element: ElementRef) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|fragment| !fragment.is_empty())
        .collect()
}
