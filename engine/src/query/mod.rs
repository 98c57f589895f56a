//! Query evaluation over heterogeneously typed records.
//!
//! Raw option strings arrive in [`QueryOptions`]. They are parsed once into a
//! [`ListQuery`] or [`RecordQuery`], failing fast on syntax and limit errors,
//! and then evaluated per record.

pub mod expand;
pub mod filter;
pub mod orderby;
pub mod search;
pub mod select;

pub use expand::Expand;
pub use filter::Filter;
pub use orderby::{Direction, OrderBy};
pub use search::SearchQuery;
pub use select::Select;

use crate::{error::Result, schema::Catalog, Error, Limits, Record};
use serde::{Deserialize, Serialize};

/// Raw query options as supplied by a client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryOptions {
    #[serde(rename = "$filter", default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    #[serde(rename = "$orderby", default, skip_serializing_if = "Option::is_none")]
    pub orderby: Option<String>,
    #[serde(rename = "$select", default, skip_serializing_if = "Option::is_none")]
    pub select: Option<String>,
    #[serde(rename = "$expand", default, skip_serializing_if = "Option::is_none")]
    pub expand: Option<String>,
    #[serde(rename = "q", default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(rename = "$top", default, skip_serializing_if = "Option::is_none")]
    pub top: Option<String>,
    #[serde(rename = "$skip", default, skip_serializing_if = "Option::is_none")]
    pub skip: Option<String>,
    #[serde(rename = "$inlinecount", default, skip_serializing_if = "Option::is_none")]
    pub inlinecount: Option<String>,
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn with_orderby(mut self, orderby: impl Into<String>) -> Self {
        self.orderby = Some(orderby.into());
        self
    }

    pub fn with_select(mut self, select: impl Into<String>) -> Self {
        self.select = Some(select.into());
        self
    }

    pub fn with_expand(mut self, expand: impl Into<String>) -> Self {
        self.expand = Some(expand.into());
        self
    }

    pub fn with_search(mut self, q: impl Into<String>) -> Self {
        self.search = Some(q.into());
        self
    }

    pub fn with_top(mut self, top: usize) -> Self {
        self.top = Some(top.to_string());
        self
    }

    pub fn with_skip(mut self, skip: usize) -> Self {
        self.skip = Some(skip.to_string());
        self
    }

    pub fn with_inlinecount(mut self, inlinecount: impl Into<String>) -> Self {
        self.inlinecount = Some(inlinecount.into());
        self
    }
}

/// Whether a list response carries the total match count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InlineCount {
    #[default]
    None,
    AllPages,
}

impl InlineCount {
    fn parse(source: &str) -> Result<Self> {
        match source {
            "allpages" => Ok(InlineCount::AllPages),
            "none" => Ok(InlineCount::None),
            other => Err(Error::syntax(
                "$inlinecount",
                format!("expected 'allpages' or 'none', got '{}'", other),
            )),
        }
    }
}

fn parse_bound(option: &'static str, source: &str, max: usize) -> Result<usize> {
    if source.is_empty() || !source.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::syntax(
            option,
            format!("'{}' is not a non-negative integer", source),
        ));
    }
    // All digits, so parsing only fails on overflow.
    match source.parse::<usize>() {
        Ok(value) if value <= max => Ok(value),
        _ => Err(Error::limit(
            option,
            format!("{} exceeds limit of {}", source, max),
        )),
    }
}

/// Options for fetching a single record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordQuery {
    pub select: Select,
    pub expand: Expand,
}

impl RecordQuery {
    pub fn parse(
        options: &QueryOptions,
        catalog: &Catalog,
        entity_type: &str,
        limits: &Limits,
    ) -> Result<Self> {
        catalog.entity_type(entity_type)?;
        Ok(Self {
            select: parse_select(options)?,
            expand: parse_expand(options, catalog, entity_type, limits.expand_max_retrieve)?,
        })
    }
}

/// Options for listing records.
#[derive(Debug, Clone)]
pub struct ListQuery {
    pub filter: Option<Filter>,
    pub search: Option<SearchQuery>,
    pub order: OrderBy,
    pub select: Select,
    pub expand: Expand,
    pub top: usize,
    pub skip: usize,
    pub inlinecount: InlineCount,
}

impl ListQuery {
    pub fn parse(
        options: &QueryOptions,
        catalog: &Catalog,
        entity_type: &str,
        limits: &Limits,
    ) -> Result<Self> {
        let definition = catalog.entity_type(entity_type)?;

        let filter = options
            .filter
            .as_deref()
            .map(|f| Filter::parse(f, definition))
            .transpose()?;
        let search = options
            .search
            .as_deref()
            .map(|q| SearchQuery::parse(q, limits))
            .transpose()?;
        let order = match options.orderby.as_deref() {
            Some(source) => OrderBy::parse(source, definition)?,
            None => OrderBy::default(),
        };
        let expand = parse_expand(options, catalog, entity_type, limits.expand_max_list)?;

        let top_max = if expand.is_empty() {
            limits.top_max
        } else {
            limits.expand_top_max
        };
        let top = match options.top.as_deref() {
            Some(source) => parse_bound("$top", source, top_max)?,
            None => limits.top_default.min(top_max),
        };
        let skip = match options.skip.as_deref() {
            Some(source) => parse_bound("$skip", source, limits.skip_max)?,
            None => 0,
        };
        let inlinecount = match options.inlinecount.as_deref() {
            Some(source) => InlineCount::parse(source)?,
            None => InlineCount::None,
        };

        Ok(Self {
            filter,
            search,
            order,
            select: parse_select(options)?,
            expand,
            top,
            skip,
            inlinecount,
        })
    }

    /// Whether a record passes both the filter and the search query.
    pub fn matches(&self, record: &Record) -> bool {
        self.filter.as_ref().map_or(true, |f| f.matches(record))
            && self.search.as_ref().map_or(true, |q| q.matches(record))
    }

    /// Sort the matching records and cut out the requested page.
    ///
    /// Returns the page and the number of records before paging.
    pub fn page(&self, mut records: Vec<Record>) -> (Vec<Record>, usize) {
        let total = records.len();
        self.order.sort(&mut records);
        let page = records.into_iter().skip(self.skip).take(self.top).collect();
        (page, total)
    }
}

fn parse_select(options: &QueryOptions) -> Result<Select> {
    options
        .select
        .as_deref()
        .map(Select::parse)
        .transpose()
        .map(Option::unwrap_or_default)
}

fn parse_expand(
    options: &QueryOptions,
    catalog: &Catalog,
    entity_type: &str,
    cap: usize,
) -> Result<Expand> {
    options
        .expand
        .as_deref()
        .map(|e| Expand::parse(e, catalog, entity_type, cap))
        .transpose()
        .map(Option::unwrap_or_default)
}
