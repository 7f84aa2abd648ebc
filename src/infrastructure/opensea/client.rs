//! OpenSea REST client: collection floor price and best collection offer

use async_trait::async_trait;
use reqwest::StatusCode;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, warn};

use crate::domain::price::{PriceField, PriceSnapshot, PriceSource};
use crate::shared::errors::{AppError, SourceError};
use crate::shared::types::PriceQuote;
use crate::shared::utils::{from_base_units, truncate_for_log};

pub const DEFAULT_API_BASE: &str = "https://api.opensea.io/api/v2";

const USER_AGENT: &str = concat!("pricewatch/", env!("CARGO_PKG_VERSION"));

/// Offer pages followed per fetch
const MAX_OFFER_PAGES: usize = 5;

#[derive(Debug, Deserialize)]
struct StatsResponse {
    total: StatsTotal,
}

#[derive(Debug, Deserialize)]
struct StatsTotal {
    floor_price: Option<serde_json::Number>,
    floor_price_symbol: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OffersResponse {
    #[serde(default)]
    offers: Vec<Offer>,
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Offer {
    price: OfferPrice,
    protocol_data: Option<ProtocolData>,
}

#[derive(Debug, Deserialize)]
struct ProtocolData {
    parameters: OrderParameters,
}

#[derive(Debug, Deserialize)]
struct OrderParameters {
    #[serde(default)]
    consideration: Vec<ConsiderationItem>,
}

/// First consideration item is the NFT side; its amount is the item count
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConsiderationItem {
    start_amount: String,
}

#[derive(Debug, Deserialize)]
struct OfferPrice {
    currency: String,
    decimals: u32,
    value: String,
}

/// Reads prices from the OpenSea v2 API. Floor price and offers are fetched
/// concurrently; the caller sees a single outcome.
pub struct OpenSeaPriceSource {
    client: reqwest::Client,
    api_base: String,
    api_key: Option<String>,
}

impl OpenSeaPriceSource {
    pub fn new(api_key: Option<String>, timeout: Duration) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| AppError::HttpClientError(e.to_string()))?;

        Ok(Self {
            client,
            api_base: DEFAULT_API_BASE.to_string(),
            api_key,
        })
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str, query: &[(&str, &str)]) -> Result<T, SourceError> {
        debug!("Accessing {}", url);
        let mut request = self
            .client
            .get(url)
            .query(query)
            .header("accept", "application/json");
        if let Some(key) = &self.api_key {
            request = request.header("x-api-key", key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SourceError::Transient(format!("request to {} failed: {}", url, e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SourceError::Transient(format!("reading response from {} failed: {}", url, e)))?;

        if !status.is_success() {
            return Err(classify_status(status, url, &body));
        }

        serde_json::from_str(&body).map_err(|e| {
            SourceError::Parse(format!("unexpected payload from {}: {} ({})", url, e, truncate_for_log(&body, 200)))
        })
    }

    /// Collection offers across pages, stopping after `MAX_OFFER_PAGES`
    async fn get_offers(&self, url: &str) -> Result<Vec<Offer>, SourceError> {
        let mut offers = Vec::new();
        let mut cursor: Option<String> = None;

        for _ in 0..MAX_OFFER_PAGES {
            let query: Vec<(&str, &str)> = cursor.as_deref().map(|c| ("next", c)).into_iter().collect();
            let page: OffersResponse = self.get_json(url, &query).await?;
            offers.extend(page.offers);

            match page.next.filter(|next| !next.is_empty()) {
                Some(next) => cursor = Some(next),
                None => return Ok(offers),
            }
        }

        warn!(
            "Offers for {} span more than {} pages, using the first {} offers",
            url,
            MAX_OFFER_PAGES,
            offers.len()
        );
        Ok(offers)
    }
}

#[async_trait]
impl PriceSource for OpenSeaPriceSource {
    async fn fetch(&self, resource_id: &str) -> Result<PriceSnapshot, SourceError> {
        validate_slug(resource_id)?;

        let stats_url = format!("{}/collections/{}/stats", self.api_base, resource_id);
        let offers_url = format!("{}/offers/collection/{}", self.api_base, resource_id);

        let (stats, offers) = both(tokio::join!(
            self.get_json::<StatsResponse>(&stats_url, &[]),
            self.get_offers(&offers_url),
        ))?;

        let floor_price = parse_floor(&stats)?;
        let best_offer = parse_best_offer(&offers)?;

        Ok(PriceSnapshot::new(resource_id, floor_price, best_offer))
    }
}

/// Collection slugs are lowercase ASCII letters, digits, `-` and `_`
fn validate_slug(slug: &str) -> Result<(), SourceError> {
    let valid = !slug.is_empty()
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(SourceError::Permanent(format!("malformed collection slug {:?}", slug)))
    }
}

/// Both results or one error. A permanent failure wins over a retryable
/// one so the outcome does not depend on which request finished first.
fn both<A, B>(results: (Result<A, SourceError>, Result<B, SourceError>)) -> Result<(A, B), SourceError> {
    match results {
        (Ok(a), Ok(b)) => Ok((a, b)),
        (Err(e @ SourceError::Permanent(_)), _) | (_, Err(e @ SourceError::Permanent(_))) => Err(e),
        (Err(e), _) | (_, Err(e)) => Err(e),
    }
}

fn classify_status(status: StatusCode, url: &str, body: &str) -> SourceError {
    let detail = format!("{} returned {}: {}", url, status, truncate_for_log(body, 200));
    match status {
        StatusCode::NOT_FOUND | StatusCode::BAD_REQUEST => SourceError::Permanent(detail),
        _ => SourceError::Transient(detail),
    }
}

fn parse_floor(stats: &StatsResponse) -> Result<PriceQuote, SourceError> {
    let amount = stats
        .total
        .floor_price
        .as_ref()
        .ok_or_else(|| SourceError::Parse("floor price missing".to_string()))?;
    let amount = Decimal::from_str(&amount.to_string())
        .or_else(|_| Decimal::from_scientific(&amount.to_string()))
        .map_err(|e| SourceError::Parse(format!("floor price {}: {}", amount, e)))?;
    let currency = stats.total.floor_price_symbol.clone().unwrap_or_default();

    usable(PriceField::FloorPrice, PriceQuote::new(amount, currency)?)
}

/// Highest per-item price among the offers. `price.value` covers every
/// item an offer asks for, so bulk offers are divided by their quantity.
fn parse_best_offer(offers: &[Offer]) -> Result<PriceQuote, SourceError> {
    let mut best: Option<PriceQuote> = None;
    for offer in offers {
        let total = from_base_units(&offer.price.value, offer.price.decimals).ok_or_else(|| {
            SourceError::Parse(format!("offer value {:?} is not an integer", offer.price.value))
        })?;
        let quantity = offer_quantity(offer)?;
        let amount = total
            .checked_div(Decimal::from(quantity))
            .ok_or_else(|| SourceError::Parse(format!("offer value {} over {} items", total, quantity)))?
            .round_dp(offer.price.decimals)
            .normalize();

        let quote = PriceQuote::new(amount, offer.price.currency.as_str())?;
        if best.as_ref().map_or(true, |b| quote.amount > b.amount) {
            best = Some(quote);
        }
    }

    let best = best.ok_or_else(|| SourceError::Parse("no offers listed".to_string()))?;
    usable(PriceField::BestOffer, best)
}

fn offer_quantity(offer: &Offer) -> Result<u64, SourceError> {
    let start_amount = offer
        .protocol_data
        .as_ref()
        .and_then(|data| data.parameters.consideration.first())
        .map(|item| item.start_amount.as_str())
        .ok_or_else(|| SourceError::Parse("offer quantity missing".to_string()))?;

    match start_amount.parse::<u64>() {
        Ok(quantity) if quantity > 0 => Ok(quantity),
        _ => Err(SourceError::Parse(format!("offer quantity {:?} is not a positive integer", start_amount))),
    }
}

/// Zero amounts and unknown currencies are layout or indexing glitches,
/// worth another try rather than a price to record
fn usable(field: PriceField, quote: PriceQuote) -> Result<PriceQuote, SourceError> {
    if quote.amount.is_zero() {
        return Err(SourceError::Parse(format!("{} is zero", field.label())));
    }
    if quote.currency.eq_ignore_ascii_case("UNKNOWN") {
        return Err(SourceError::Parse(format!("{} has unknown currency", field.label())));
    }
    Ok(quote)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn stats(value: serde_json::Value) -> StatsResponse {
        serde_json::from_value(value).unwrap()
    }

    fn offers(value: serde_json::Value) -> Vec<Offer> {
        serde_json::from_value::<OffersResponse>(value).unwrap().offers
    }

    /// Offer JSON as the collection offers endpoint returns it
    fn offer(value: &str, quantity: &str) -> serde_json::Value {
        json!({
            "order_hash": "0x01",
            "price": { "currency": "WETH", "decimals": 18, "value": value },
            "protocol_data": {
                "parameters": {
                    "offer": [{ "itemType": 1, "startAmount": value, "endAmount": value }],
                    "consideration": [
                        { "itemType": 4, "startAmount": quantity, "endAmount": quantity },
                        { "itemType": 1, "startAmount": "10000000000000000", "endAmount": "10000000000000000" }
                    ]
                }
            }
        })
    }

    #[test]
    fn test_parse_floor() {
        let floor = parse_floor(&stats(json!({
            "total": { "volume": 1234.5, "floor_price": 0.441, "floor_price_symbol": "ETH" },
            "intervals": []
        })))
        .unwrap();
        assert_eq!(floor, "0.441 ETH".parse().unwrap());
    }

    #[test]
    fn test_missing_or_zero_floor_is_parse_error() {
        let missing = parse_floor(&stats(json!({ "total": { "floor_price_symbol": "ETH" } })));
        assert!(matches!(missing, Err(SourceError::Parse(_))));

        let zero = parse_floor(&stats(json!({
            "total": { "floor_price": 0, "floor_price_symbol": "ETH" }
        })));
        assert!(matches!(zero, Err(SourceError::Parse(_))));

        let no_symbol = parse_floor(&stats(json!({ "total": { "floor_price": 0.4 } })));
        assert!(matches!(no_symbol, Err(SourceError::Parse(_))));
    }

    #[test]
    fn test_best_offer_picks_highest() {
        let best = parse_best_offer(&offers(json!({
            "offers": [
                offer("400000000000000000", "1"),
                offer("407000000000000000", "1"),
                offer("39000000000000000", "1")
            ],
            "next": null
        })))
        .unwrap();
        assert_eq!(best, "0.407 WETH".parse().unwrap());
    }

    #[test]
    fn test_bulk_offer_ranked_per_item() {
        let best = parse_best_offer(&offers(json!({
            "offers": [
                offer("4000000000000000000", "10"),
                offer("410000000000000000", "1")
            ]
        })))
        .unwrap();
        assert_eq!(best, "0.41 WETH".parse().unwrap());

        let bulk_only = parse_best_offer(&offers(json!({
            "offers": [offer("1200000000000000000", "3")]
        })))
        .unwrap();
        assert_eq!(bulk_only, "0.4 WETH".parse().unwrap());
        assert_eq!(bulk_only.to_string(), "0.4 WETH");
    }

    #[test]
    fn test_missing_or_zero_quantity_is_parse_error() {
        let zero = parse_best_offer(&offers(json!({ "offers": [offer("400000000000000000", "0")] })));
        assert!(matches!(zero, Err(SourceError::Parse(_))));

        let missing = parse_best_offer(&offers(json!({
            "offers": [{ "price": { "currency": "WETH", "decimals": 18, "value": "400000000000000000" } }]
        })));
        assert!(matches!(missing, Err(SourceError::Parse(_))));
    }

    #[test]
    fn test_no_offers_is_parse_error() {
        assert!(matches!(
            parse_best_offer(&offers(json!({ "offers": [] }))),
            Err(SourceError::Parse(_))
        ));
        assert!(matches!(
            parse_best_offer(&offers(json!({ "offers": [offer("0.4", "1")] }))),
            Err(SourceError::Parse(_))
        ));
    }

    #[test]
    fn test_permanent_error_wins_regardless_of_order() {
        let permanent = || SourceError::Permanent("stats returned 404".into());
        let transient = || SourceError::Transient("offers returned 502".into());

        let stats_first: Result<((), ()), _> = both((Err(permanent()), Err(transient())));
        let offers_first: Result<((), ()), _> = both((Err(transient()), Err(permanent())));
        assert!(matches!(stats_first, Err(SourceError::Permanent(_))));
        assert!(matches!(offers_first, Err(SourceError::Permanent(_))));

        let one_failed: Result<((), ()), _> = both((Ok(()), Err(transient())));
        assert!(matches!(one_failed, Err(SourceError::Transient(_))));
        assert!(both::<u8, u8>((Ok(1), Ok(2))).is_ok());
    }

    #[test]
    fn test_status_classification() {
        assert!(matches!(
            classify_status(StatusCode::NOT_FOUND, "u", ""),
            SourceError::Permanent(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::TOO_MANY_REQUESTS, "u", ""),
            SourceError::Transient(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::BAD_GATEWAY, "u", "<html>"),
            SourceError::Transient(_)
        ));
    }

    #[test]
    fn test_slug_validation() {
        assert!(validate_slug("hypio").is_ok());
        assert!(validate_slug("bored-ape_yacht-club2").is_ok());
        assert!(matches!(validate_slug(""), Err(SourceError::Permanent(_))));
        assert!(matches!(validate_slug("../admin"), Err(SourceError::Permanent(_))));
    }

    #[tokio::test]
    async fn test_malformed_slug_fails_without_network() {
        let source = OpenSeaPriceSource::new(None, Duration::from_secs(1))
            .unwrap()
            .with_api_base("http://127.0.0.1:9");
        let err = source.fetch("Not A Slug").await.unwrap_err();
        assert!(matches!(err, SourceError::Permanent(_)));
    }
}
