//! Data retrieval for queries and query groups.
//!
//! Both resource types expose the same analytics endpoints; they differ
//! only in the parameter that carries the resource id (`queryId` or
//! `queryGroupId`). [`DataSource`] provides every call on top of that.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde_json::{json, Map, Value};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::filters::{self, MentionFilters};
use crate::project::Project;
use crate::resources::{Groups, NameResolver, Queries, Resource, ResourceIndex, ResourceRef};
use crate::sdk::api_client::QueryParams;
use crate::sdk::types::Mention;

/// Mentions per page unless the filters set `pageSize`.
pub const DEFAULT_PAGE_SIZE: u32 = 5000;

const MENTIONS_FULLTEXT: &str = "data/mentions/fulltext";

/// Items returned by the key insights topic and news lists.
pub const KEY_INSIGHTS_SIZE: u32 = 3;

/// Twitter insights features, each served by `data/<feature>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TwitterFeature {
    Hashtags,
    Emoticons,
    Urls,
    MentionedAuthors,
}

impl TwitterFeature {
    pub const ALL: [TwitterFeature; 4] = [
        TwitterFeature::Hashtags,
        TwitterFeature::Emoticons,
        TwitterFeature::Urls,
        TwitterFeature::MentionedAuthors,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TwitterFeature::Hashtags => "hashtags",
            TwitterFeature::Emoticons => "emoticons",
            TwitterFeature::Urls => "urls",
            TwitterFeature::MentionedAuthors => "mentionedauthors",
        }
    }
}

/// Demographic breakdowns, each served by `demographics/<kind>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Demographic {
    Gender,
    Interest,
    Profession,
    Countries,
}

impl Demographic {
    pub const ALL: [Demographic; 4] = [
        Demographic::Gender,
        Demographic::Interest,
        Demographic::Profession,
        Demographic::Countries,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Demographic::Gender => "gender",
            Demographic::Interest => "interest",
            Demographic::Profession => "profession",
            Demographic::Countries => "countries",
        }
    }
}

/// Default end date: tomorrow, so today's mentions are included.
pub fn default_end_date() -> String {
    (Utc::now().date_naive() + Duration::days(1))
        .format("%Y-%m-%d")
        .to_string()
}

/// Pull `path` out of a response, failing when any step is missing.
fn field(response: Value, path: &[&str]) -> Result<Value> {
    let mut current = response;
    for key in path {
        current = match current {
            Value::Object(mut map) => map.remove(*key),
            _ => None,
        }
        .ok_or_else(|| Error::UnexpectedResponse(format!("response has no {}", path.join("."))))?;
    }
    Ok(current)
}

/// Analytics calls shared by queries and query groups.
#[async_trait]
pub trait DataSource: Send + Sync {
    fn data_index(&self) -> &ResourceIndex;

    fn data_resolver(&self) -> &NameResolver;

    /// Query parameter that carries the resource id.
    fn id_param(&self) -> &'static str;

    fn data_project(&self) -> &Project {
        self.data_index().project()
    }

    /// Request parameters for a data call: resource id, date range and
    /// filters with names translated to ids.
    async fn data_params(
        &self,
        target: &ResourceRef,
        start_date: &str,
        filters: &MentionFilters,
    ) -> Result<QueryParams> {
        if start_date.trim().is_empty() {
            return Err(Error::MissingField("startDate".to_string()));
        }

        let id = self.data_index().resolve(target)?;
        let end_date = match filters.get("endDate") {
            Some(Value::String(end)) => end.clone(),
            Some(other) => {
                return Err(Error::InvalidSetting(format!("invalid endDate {}", other)))
            }
            None => default_end_date(),
        };

        let mut params = QueryParams::new()
            .with(self.id_param(), id)
            .with("startDate", start_date)
            .with("endDate", end_date);

        for (name, setting) in filters.iter() {
            if name == "endDate" {
                continue;
            }
            let setting = self.data_resolver().to_ids(name, setting).await?;
            filters::validate_param(name, &setting)?;
            params.push_value(name, &setting);
        }
        Ok(params)
    }

    /// GET a data endpoint with the standard parameters.
    async fn get_data(
        &self,
        endpoint: &str,
        target: &ResourceRef,
        start_date: &str,
        filters: &MentionFilters,
    ) -> Result<Value> {
        let params = self.data_params(target, start_date, filters).await?;
        self.data_project().get(endpoint, &params).await
    }

    /// Every mention matching the filters, one page at a time.
    ///
    /// Stops at the first empty page, or before page number `max_pages`.
    async fn mentions(
        &self,
        target: &ResourceRef,
        start_date: &str,
        max_pages: Option<u32>,
        filters: &MentionFilters,
    ) -> Result<Vec<Mention>> {
        let mut params = self.data_params(target, start_date, filters).await?;
        if !params.contains("pageSize") {
            params.set("pageSize", DEFAULT_PAGE_SIZE);
        }
        let mut page: u32 = match params.get("page") {
            Some(page) => page
                .parse()
                .map_err(|_| Error::InvalidSetting(format!("invalid page {}", page)))?,
            None => 0,
        };

        let mut mentions = Vec::new();
        while max_pages.map_or(true, |max| page < max) {
            params.set("page", page);
            let response = self.data_project().get(MENTIONS_FULLTEXT, &params).await?;
            let results: Vec<Mention> = serde_json::from_value(field(response, &["results"])?)?;
            if results.is_empty() {
                break;
            }

            mentions.extend(results);
            debug!(
                "Page {} of {} {} retrieved",
                page,
                self.data_index().resource_type(),
                target
            );
            page += 1;
        }

        info!("{} mentions downloaded", mentions.len());
        Ok(mentions)
    }

    async fn mention_count(
        &self,
        target: &ResourceRef,
        start_date: &str,
        filters: &MentionFilters,
    ) -> Result<u64> {
        let response = self
            .get_data("data/mentions/count", target, start_date, filters)
            .await?;
        field(response, &["mentionsCount"])?
            .as_u64()
            .ok_or_else(|| Error::UnexpectedResponse("mentionsCount is not a count".to_string()))
    }

    /// Chart data: `y_axis` (e.g. `volume`) over `x_axis` (e.g. `days`)
    /// broken down by `breakdown_by` (e.g. `queries`).
    ///
    /// `dim1Args` and `dim2Args` filters are translated as `x_axis` and
    /// `breakdown_by` attributes respectively.
    async fn chart(
        &self,
        target: &ResourceRef,
        start_date: &str,
        y_axis: &str,
        x_axis: &str,
        breakdown_by: &str,
        filters: &MentionFilters,
    ) -> Result<Value> {
        for (axis, value) in [("y_axis", y_axis), ("x_axis", x_axis), ("breakdown_by", breakdown_by)] {
            if value.trim().is_empty() {
                return Err(Error::MissingField(axis.to_string()));
            }
        }

        let mut rest = filters.clone();
        let dim1 = rest.remove("dim1Args");
        let dim2 = rest.remove("dim2Args");

        let mut params = self.data_params(target, start_date, &rest).await?;
        for (name, attribute, setting) in [("dim1Args", x_axis, dim1), ("dim2Args", breakdown_by, dim2)] {
            if let Some(setting) = setting {
                let setting = self.data_resolver().to_ids(attribute, &setting).await?;
                params.push_value(name, &setting);
            }
        }

        let endpoint = format!("data/{}/{}/{}", y_axis, x_axis, breakdown_by);
        self.data_project().get(&endpoint, &params).await
    }

    async fn topics(&self, target: &ResourceRef, start_date: &str, filters: &MentionFilters) -> Result<Value> {
        let response = self
            .get_data("data/volume/topics/queries", target, start_date, filters)
            .await?;
        field(response, &["topics"])
    }

    /// Topics compared between genders.
    async fn topics_comparison(
        &self,
        target: &ResourceRef,
        start_date: &str,
        filters: &MentionFilters,
    ) -> Result<Value> {
        let response = self
            .get_data("data/volume/topics/compare/gender", target, start_date, filters)
            .await?;
        field(response, &["topics"])
    }

    async fn authors(&self, target: &ResourceRef, start_date: &str, filters: &MentionFilters) -> Result<Value> {
        let response = self
            .get_data("data/volume/topauthors/queries", target, start_date, filters)
            .await?;
        field(response, &["results"])
    }

    /// Daily mention volume.
    async fn history(&self, target: &ResourceRef, start_date: &str, filters: &MentionFilters) -> Result<Value> {
        let response = self
            .get_data("data/volume/queries/days", target, start_date, filters)
            .await?;
        field(response, &["results"])
    }

    async fn top_sites(&self, target: &ResourceRef, start_date: &str, filters: &MentionFilters) -> Result<Value> {
        let response = self
            .get_data("data/volume/topsites/queries", target, start_date, filters)
            .await?;
        field(response, &["results"])
    }

    async fn tweeters(&self, target: &ResourceRef, start_date: &str, filters: &MentionFilters) -> Result<Value> {
        let response = self
            .get_data("data/volume/toptweeters/queries", target, start_date, filters)
            .await?;
        field(response, &["results"])
    }

    /// Mention volume per page type.
    async fn volume(&self, target: &ResourceRef, start_date: &str, filters: &MentionFilters) -> Result<Value> {
        let response = self
            .get_data("data/volume/queries/pageTypes", target, start_date, filters)
            .await?;
        field(response, &["results"])
    }

    /// Mention volume per country.
    async fn world(&self, target: &ResourceRef, start_date: &str, filters: &MentionFilters) -> Result<Value> {
        let response = self
            .get_data("data/volume/queries/countries", target, start_date, filters)
            .await?;
        field(response, &["results", "values"])
    }

    /// Daily sentiment breakdown.
    async fn summary_sentiment(
        &self,
        target: &ResourceRef,
        start_date: &str,
        filters: &MentionFilters,
    ) -> Result<Value> {
        let response = self
            .get_data("data/volume/sentiment/days", target, start_date, filters)
            .await?;
        field(response, &["results"])
    }

    /// Sentiment, top sites and page types in one object.
    async fn summary(&self, target: &ResourceRef, start_date: &str, filters: &MentionFilters) -> Result<Value> {
        Ok(json!({
            "sentiment": self.summary_sentiment(target, start_date, filters).await?,
            "topsites": self.top_sites(target, start_date, filters).await?,
            "pagetypes": self.volume(target, start_date, filters).await?,
        }))
    }

    /// Mention volume per query, broken down by sentiment.
    async fn volume_by_sentiment(
        &self,
        target: &ResourceRef,
        start_date: &str,
        filters: &MentionFilters,
    ) -> Result<Value> {
        let response = self
            .get_data("data/volume/queries/sentiment", target, start_date, filters)
            .await?;
        field(response, &["results"])
    }

    /// Number of distinct authors in the period.
    async fn unique_author_count(
        &self,
        target: &ResourceRef,
        start_date: &str,
        filters: &MentionFilters,
    ) -> Result<u64> {
        let response = self
            .get_data("data/authors/months/queries", target, start_date, filters)
            .await?;
        response
            .pointer("/results/0/values/0/value")
            .and_then(Value::as_u64)
            .ok_or_else(|| {
                Error::UnexpectedResponse(format!("no author count in {}", response))
            })
    }

    /// Top trending topics; `limit` defaults to three.
    async fn topic_trends(
        &self,
        target: &ResourceRef,
        start_date: &str,
        filters: &MentionFilters,
    ) -> Result<Value> {
        let mut filters = filters.clone();
        if filters.get("limit").is_none() {
            filters.insert("limit", KEY_INSIGHTS_SIZE);
        }
        self.topics(target, start_date, &filters).await
    }

    /// Latest news mentions; `pageSize` defaults to three.
    async fn rising_news(
        &self,
        target: &ResourceRef,
        start_date: &str,
        filters: &MentionFilters,
    ) -> Result<Value> {
        let mut filters = filters.clone();
        if filters.get("pageSize").is_none() {
            filters.insert("pageSize", KEY_INSIGHTS_SIZE);
        }
        let response = self
            .get_data("data/mentions", target, start_date, &filters)
            .await?;
        field(response, &["results"])
    }

    /// Mention count, author count, topic trends and rising news.
    async fn key_insights(
        &self,
        target: &ResourceRef,
        start_date: &str,
        filters: &MentionFilters,
    ) -> Result<Value> {
        Ok(json!({
            "total_mentions": self.mention_count(target, start_date, filters).await?,
            "unique_authors": self.unique_author_count(target, start_date, filters).await?,
            "topic_trends": self.topic_trends(target, start_date, filters).await?,
            "rising_news": self.rising_news(target, start_date, filters).await?,
        }))
    }

    async fn twitter_insight(
        &self,
        target: &ResourceRef,
        start_date: &str,
        feature: TwitterFeature,
        filters: &MentionFilters,
    ) -> Result<Value> {
        let endpoint = format!("data/{}", feature.as_str());
        self.get_data(&endpoint, target, start_date, filters).await
    }

    /// Every [`TwitterFeature`], keyed by its name.
    async fn twitter_insights(
        &self,
        target: &ResourceRef,
        start_date: &str,
        filters: &MentionFilters,
    ) -> Result<Value> {
        let mut insights = Map::new();
        for feature in TwitterFeature::ALL {
            let data = self.twitter_insight(target, start_date, feature, filters).await?;
            insights.insert(feature.as_str().to_string(), data);
        }
        Ok(Value::Object(insights))
    }

    /// Daily volume split over the named date ranges of a query.
    ///
    /// Names are looked up in `queries/<id>/date-range`; at least one must
    /// match.
    async fn date_range_comparison(
        &self,
        target: &ResourceRef,
        start_date: &str,
        date_ranges: &[&str],
        filters: &MentionFilters,
    ) -> Result<Value> {
        let id = self.data_index().resolve(target)?;
        let response = self
            .data_project()
            .get(&format!("queries/{}/date-range", id), &QueryParams::new())
            .await?;
        let available = match &response {
            Value::Array(ranges) => ranges.as_slice(),
            other => other
                .get("results")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default(),
        };

        let range_ids: Vec<i64> = available
            .iter()
            .filter(|range| {
                range
                    .get("name")
                    .and_then(Value::as_str)
                    .is_some_and(|name| date_ranges.contains(&name))
            })
            .filter_map(|range| range.get("id").and_then(Value::as_i64))
            .collect();
        if range_ids.is_empty() {
            return Err(Error::InvalidSetting(format!(
                "You must pass in a valid list of date range(s), got {:?}",
                date_ranges
            )));
        }

        let mut params = self.data_params(target, start_date, filters).await?;
        for range_id in range_ids {
            params.push("dateRanges", range_id);
        }
        let response = self
            .data_project()
            .get("data/volume/dateRanges/days", &params)
            .await?;
        field(response, &["results"])
    }

    async fn demographics(
        &self,
        target: &ResourceRef,
        start_date: &str,
        kind: Demographic,
        filters: &MentionFilters,
    ) -> Result<Value> {
        let endpoint = format!("demographics/{}", kind.as_str());
        self.get_data(&endpoint, target, start_date, filters).await
    }

    /// Every [`Demographic`] breakdown, keyed by its name.
    async fn demographics_summary(
        &self,
        target: &ResourceRef,
        start_date: &str,
        filters: &MentionFilters,
    ) -> Result<Value> {
        let mut summary = Map::new();
        for kind in Demographic::ALL {
            let data = self.demographics(target, start_date, kind, filters).await?;
            summary.insert(kind.as_str().to_string(), data);
        }
        Ok(Value::Object(summary))
    }
}

impl DataSource for Queries {
    fn data_index(&self) -> &ResourceIndex {
        self.index()
    }

    fn data_resolver(&self) -> &NameResolver {
        self.resolver()
    }

    fn id_param(&self) -> &'static str {
        "queryId"
    }
}

impl DataSource for Groups {
    fn data_index(&self) -> &ResourceIndex {
        self.index()
    }

    fn data_resolver(&self) -> &NameResolver {
        self.queries().resolver()
    }

    fn id_param(&self) -> &'static str {
        "queryGroupId"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_end_date_is_tomorrow() {
        let tomorrow = Utc::now().date_naive() + Duration::days(1);
        assert_eq!(default_end_date(), tomorrow.format("%Y-%m-%d").to_string());
    }

    #[test]
    fn test_field_walks_nested_objects() {
        let response = json!({"results": {"values": [1, 2]}});
        assert_eq!(field(response, &["results", "values"]).unwrap(), json!([1, 2]));
    }

    #[test]
    fn test_feature_names() {
        let features: Vec<&str> = TwitterFeature::ALL.iter().map(|f| f.as_str()).collect();
        assert_eq!(features, vec!["hashtags", "emoticons", "urls", "mentionedauthors"]);
        assert_eq!(Demographic::Countries.as_str(), "countries");
    }

    #[test]
    fn test_field_missing() {
        let err = field(json!({"results": []}), &["topics"]).unwrap_err();
        assert!(matches!(err, Error::UnexpectedResponse(_)));
        assert!(field(json!({"results": 1}), &["results", "values"]).is_err());
    }
}
