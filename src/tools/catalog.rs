//! Built-in third-party integrations.
//!
//! Pure data: each entry is an [`ExternalToolSpec`]. An integration whose
//! credential or endpoint is not configured is left out. Crypto, joke,
//! dictionary and quote lookups fall back to public key-less APIs.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use secrecy::SecretString;
use serde_json::{Map, Value, json};

use crate::config::IntegrationsConfig;
use crate::tools::external::{
    Auth, ExternalTool, ExternalToolSpec, ParamStyle, ResponseMapper,
};
use crate::tools::{ToolDescriptor, ToolError};

/// Recommendation engine calls get longer than ordinary lookups.
const REC_ENGINE_TIMEOUT: Duration = Duration::from_secs(15);

const API_NINJAS: &str = "https://api.api-ninjas.com/v1";

/// Relay-backed integrations: name and description.
const RELAY_TOOLS: &[(&str, &str)] = &[
    (
        "stripe_tool",
        "Create payment links, charges and refunds through Stripe.",
    ),
    ("gmail_tool", "Send and read Gmail messages."),
    ("email_tool", "Send an email through the configured mail provider."),
    ("calendar_tool", "Create, update and list calendar events."),
    (
        "webapp_tool",
        "Read and update data in the companion web app.",
    ),
    (
        "google_maps_tool",
        "Geocode places, search nearby locations and get directions with Google Maps.",
    ),
];

/// Every name the catalog can produce, in registration order.
pub const CATALOG_NAMES: &[&str] = &[
    "set_recommendation_weights",
    "boost_creator",
    "demote_creator",
    "block_tag",
    "unblock_tag",
    "fetch_news",
    "get_weather",
    "search_pinterest",
    "calendly_events",
    "search_images",
    "search_movies",
    "crypto_price",
    "random_joke",
    "define_word",
    "random_quote",
    "stripe_tool",
    "gmail_tool",
    "email_tool",
    "calendar_tool",
    "webapp_tool",
    "google_maps_tool",
];

fn skipped(name: &str, env: &str) {
    tracing::debug!(tool_name = name, "Skipping integration, {} not set", env);
}

fn bearer_or_none(key: Option<&SecretString>) -> Auth {
    key.cloned().map(Auth::Bearer).unwrap_or(Auth::None)
}

fn api_ninjas(key: &SecretString) -> Auth {
    Auth::Header {
        name: "X-Api-Key".to_string(),
        key: key.clone(),
    }
}

fn check_factor(params: &Map<String, Value>) -> Result<(), ToolError> {
    let factor = params
        .get("factor")
        .and_then(Value::as_f64)
        .ok_or_else(|| ToolError::InvalidParameters("'factor' must be a number".to_string()))?;
    if !(0.0..=10.0).contains(&factor) {
        return Err(ToolError::InvalidParameters(format!(
            "'factor' must be between 0 and 10, got {factor}"
        )));
    }
    Ok(())
}

fn recommendation_specs(base: &str, key: Option<&SecretString>) -> Vec<ExternalToolSpec> {
    let creator_schema = |verb: &str| {
        json!({
            "type": "object",
            "properties": {
                "creator_id": {"type": "string", "description": format!("Creator/user ID to {verb}")},
                "factor": {
                    "type": "number",
                    "minimum": 0,
                    "maximum": 10,
                    "description": format!("{verb} factor: 0 disables, 1 is no change, >1 {verb}s")
                }
            },
            "required": ["creator_id", "factor"]
        })
    };
    let tag_schema = |verb: &str| {
        json!({
            "type": "object",
            "properties": {
                "tag": {"type": "string", "description": format!("Content tag or category to {verb}")}
            },
            "required": ["tag"]
        })
    };
    let endpoint = |path: &str| format!("{base}/api/control/{path}");

    vec![
        ExternalToolSpec::post(
            "set_recommendation_weights",
            "Set the feed ranking feature weights of the recommendation engine.",
            endpoint("set_weights"),
        )
        .with_schema(json!({
            "type": "object",
            "properties": {
                "weights": {
                    "type": "object",
                    "description": "Feature weights, e.g. {\"freshness\": 0.4, \"similarity\": 0.3, \"novelty\": 0.3}",
                    "additionalProperties": {"type": "number"}
                }
            },
            "required": ["weights"]
        })),
        ExternalToolSpec::post(
            "boost_creator",
            "Boost a creator in recommendations.",
            endpoint("boost_creator"),
        )
        .with_schema(creator_schema("boost"))
        .with_validator(check_factor),
        ExternalToolSpec::post(
            "demote_creator",
            "Demote a creator in recommendations.",
            endpoint("demote_creator"),
        )
        .with_schema(creator_schema("demote"))
        .with_validator(check_factor),
        ExternalToolSpec::post(
            "block_tag",
            "Stop recommending content with a tag.",
            endpoint("block_tag"),
        )
        .with_schema(tag_schema("block")),
        ExternalToolSpec::post(
            "unblock_tag",
            "Resume recommending content with a tag.",
            endpoint("unblock_tag"),
        )
        .with_schema(tag_schema("unblock")),
    ]
    .into_iter()
    .map(|spec| {
        spec.with_auth(bearer_or_none(key))
            .with_timeout(REC_ENGINE_TIMEOUT)
    })
    .collect()
}

fn query_schema(field: &str, description: &str, limit: Option<(&str, u64)>) -> Value {
    let mut properties = Map::new();
    properties.insert(
        field.to_string(),
        json!({"type": "string", "description": description}),
    );
    if let Some((name, default)) = limit {
        properties.insert(
            name.to_string(),
            json!({"type": "integer", "default": default, "description": "Number of results to return"}),
        );
    }
    json!({"type": "object", "properties": properties, "required": [field]})
}

fn lookup_specs(config: &IntegrationsConfig) -> Vec<ExternalToolSpec> {
    let mut specs = Vec::new();

    match &config.news_api_key {
        Some(key) => specs.push(
            ExternalToolSpec::get(
                "fetch_news",
                "Fetch the latest news articles matching a search term.",
                "https://newsapi.org/v2/everything",
            )
            .with_schema(query_schema("query", "Search term for news articles", Some(("page_size", 5))))
            .with_params(ParamStyle::query_renamed(&[("query", "q"), ("page_size", "pageSize")]))
            .with_auth(Auth::QueryParam {
                name: "apiKey".to_string(),
                key: key.clone(),
            }),
        ),
        None => skipped("fetch_news", "NEWS_TOOL_API_KEY"),
    }

    match &config.weather_api_key {
        Some(key) => specs.push(
            ExternalToolSpec::get(
                "get_weather",
                "Get the current weather for a city.",
                "https://api.openweathermap.org/data/2.5/weather",
            )
            .with_schema(query_schema("city", "City to get weather for", None))
            .with_params(ParamStyle::query_renamed(&[("city", "q")]))
            .with_query("units", "metric")
            .with_auth(Auth::QueryParam {
                name: "appid".to_string(),
                key: key.clone(),
            }),
        ),
        None => skipped("get_weather", "WEATHER_TOOL_API_KEY"),
    }

    match &config.pinterest_api_key {
        Some(key) => specs.push(
            ExternalToolSpec::get(
                "search_pinterest",
                "Search Pinterest for pins matching a term.",
                "https://api.pinterest.com/v5/search/pins",
            )
            .with_schema(query_schema("query", "Search term for Pinterest pins", Some(("limit", 5))))
            .with_params(ParamStyle::query_renamed(&[("limit", "page_size")]))
            .with_auth(Auth::Bearer(key.clone())),
        ),
        None => skipped("search_pinterest", "PINTEREST_TOOL_API_KEY"),
    }

    match &config.calendly_api_key {
        Some(key) => specs.push(
            ExternalToolSpec::get(
                "calendly_events",
                "List scheduled Calendly events for a user.",
                "https://api.calendly.com/scheduled_events",
            )
            .with_schema(json!({
                "type": "object",
                "properties": {
                    "user": {"type": "string", "description": "Calendly user URI"},
                    "count": {"type": "integer", "default": 10, "description": "Number of events to return"},
                    "status": {"type": "string", "enum": ["active", "canceled"]}
                },
                "required": ["user"]
            }))
            .with_response(ResponseMapper::Pointer("/collection".to_string()))
            .with_auth(Auth::Bearer(key.clone())),
        ),
        None => skipped("calendly_events", "CALENDLY_TOOL_API_KEY"),
    }

    match &config.pixabay_api_key {
        Some(key) => specs.push(
            ExternalToolSpec::get(
                "search_images",
                "Search Pixabay for free stock images.",
                "https://pixabay.com/api/",
            )
            .with_schema(query_schema("query", "Image search term", Some(("per_page", 5))))
            .with_params(ParamStyle::query_renamed(&[("query", "q")]))
            .with_response(ResponseMapper::Pointer("/hits".to_string()))
            .with_auth(Auth::QueryParam {
                name: "key".to_string(),
                key: key.clone(),
            }),
        ),
        None => skipped("search_images", "PIXABAY_TOOL_API_KEY"),
    }

    match &config.tmdb_api_key {
        Some(key) => specs.push(
            ExternalToolSpec::get(
                "search_movies",
                "Search The Movie Database for films by title.",
                "https://api.themoviedb.org/3/search/movie",
            )
            .with_schema(query_schema("query", "Movie title to search for", None))
            .with_response(ResponseMapper::Pointer("/results".to_string()))
            .with_auth(Auth::QueryParam {
                name: "api_key".to_string(),
                key: key.clone(),
            }),
        ),
        None => skipped("search_movies", "TMDB_TOOL_API_KEY"),
    }

    let crypto = ExternalToolSpec::get(
        "crypto_price",
        "Get current cryptocurrency prices from CoinGecko.",
        "https://api.coingecko.com/api/v3/simple/price",
    )
    .with_schema(json!({
        "type": "object",
        "properties": {
            "ids": {"type": "string", "description": "Comma-separated coin ids, e.g. bitcoin,ethereum"},
            "vs_currencies": {"type": "string", "description": "Comma-separated fiat currencies, e.g. usd,eur"}
        },
        "required": ["ids", "vs_currencies"]
    }));
    specs.push(match &config.crypto_api_key {
        Some(key) => crypto.with_auth(Auth::Header {
            name: "x-cg-demo-api-key".to_string(),
            key: key.clone(),
        }),
        None => crypto,
    });

    let joke_description = "Tell a random joke.";
    specs.push(match &config.joke_api_key {
        Some(key) => ExternalToolSpec::get("random_joke", joke_description, format!("{API_NINJAS}/jokes"))
            .with_auth(api_ninjas(key)),
        None => ExternalToolSpec::get(
            "random_joke",
            joke_description,
            "https://official-joke-api.appspot.com/random_joke",
        ),
    });

    let word_schema = query_schema("word", "Word to define", None);
    let word_description = "Look up the definition of an English word.";
    specs.push(match &config.dictionary_api_key {
        Some(key) => ExternalToolSpec::get(
            "define_word",
            word_description,
            format!("{API_NINJAS}/dictionary"),
        )
        .with_schema(word_schema)
        .with_auth(api_ninjas(key)),
        None => ExternalToolSpec::get(
            "define_word",
            word_description,
            "https://api.dictionaryapi.dev/api/v2/entries/en",
        )
        .with_schema(word_schema)
        .with_path_param("word"),
    });

    let quote_description = "Fetch a random inspirational quote.";
    specs.push(match &config.quote_api_key {
        Some(key) => ExternalToolSpec::get("random_quote", quote_description, format!("{API_NINJAS}/quotes"))
            .with_auth(api_ninjas(key)),
        None => ExternalToolSpec::get("random_quote", quote_description, "https://zenquotes.io/api/random"),
    });

    let timeout = Duration::from_secs(config.http_timeout_secs);
    specs
        .into_iter()
        .map(|spec| spec.with_timeout(timeout))
        .collect()
}

fn relay_specs(base: &str, key: Option<&SecretString>, timeout: Duration) -> Vec<ExternalToolSpec> {
    RELAY_TOOLS
        .iter()
        .map(|(name, description)| {
            ExternalToolSpec::post(*name, *description, format!("{base}/tools/{name}"))
                .with_schema(json!({
                    "type": "object",
                    "properties": {
                        "action": {"type": "string", "description": "Operation to perform"},
                        "params": {"type": "object", "description": "Operation arguments"}
                    },
                    "required": ["action"]
                }))
                .with_params(ParamStyle::RelayEnvelope)
                .with_auth(bearer_or_none(key))
                .with_timeout(timeout)
        })
        .collect()
}

/// Specs for every configured integration, in registration order.
pub fn catalog_specs(config: &IntegrationsConfig) -> Vec<ExternalToolSpec> {
    let mut specs = Vec::new();

    match &config.rec_engine_url {
        Some(base) => specs.extend(recommendation_specs(base, config.rec_api_key.as_ref())),
        None => skipped("recommendation controls", "REC_ENGINE_URL"),
    }

    specs.extend(lookup_specs(config));

    match &config.relay_url {
        Some(base) => specs.extend(relay_specs(
            base,
            config.relay_api_key.as_ref(),
            Duration::from_secs(config.http_timeout_secs),
        )),
        None => skipped("relay integrations", "RELAY_URL"),
    }

    specs
}

/// Instantiate the configured integrations over a shared HTTP client.
pub fn catalog_tools(config: &IntegrationsConfig, client: &Client) -> Vec<ToolDescriptor> {
    catalog_specs(config)
        .into_iter()
        .map(|spec| Arc::new(ExternalTool::new(spec, client.clone())) as ToolDescriptor)
        .collect()
}
