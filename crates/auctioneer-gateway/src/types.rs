//! Ad platform wire types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::GatewayResult;

/// API endpoints, appended to the versioned base URL.
pub mod endpoints {
    pub const KEYWORD_BIDS: &str = "keywordbids";
    pub const CLIENTS: &str = "clients";
    pub const CAMPAIGNS: &str = "campaigns";
    pub const ADS: &str = "ads";
    pub const SITELINKS: &str = "sitelinks";
}

/// Result keys records are nested under.
pub mod result_keys {
    pub const KEYWORD_BIDS: &str = "KeywordBids";
    pub const SET_RESULTS: &str = "SetResults";
    pub const CAMPAIGNS: &str = "Campaigns";
    pub const ADS: &str = "Ads";
    pub const SITELINKS_SETS: &str = "SitelinksSets";
    pub const CLIENTS: &str = "Clients";
}

/// Request envelope: `{"method": ..., "params": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiCall {
    pub method: String,
    pub params: Value,
}

impl ApiCall {
    pub fn new(method: impl Into<String>, params: Value) -> Self {
        Self {
            method: method.into(),
            params,
        }
    }

    pub fn get(params: Value) -> Self {
        Self::new("get", params)
    }

    pub fn set(params: Value) -> Self {
        Self::new("set", params)
    }

    pub fn to_value(&self) -> GatewayResult<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

fn names(fields: &[&str]) -> Vec<String> {
    fields.iter().map(|f| f.to_string()).collect()
}

/// Field names requested from `keywordbids.get`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct KeywordBidFieldNames {
    pub field_names: Vec<String>,
    pub search_field_names: Vec<String>,
    pub network_field_names: Vec<String>,
}

impl Default for KeywordBidFieldNames {
    fn default() -> Self {
        Self {
            field_names: names(&[
                "KeywordId",
                "AdGroupId",
                "CampaignId",
                "ServingStatus",
                "StrategyPriority",
            ]),
            search_field_names: names(&["Bid", "AuctionBids"]),
            network_field_names: names(&["Bid", "Coverage"]),
        }
    }
}

/// Field names requested from `campaigns.get`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CampaignFieldNames {
    pub field_names: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub text_campaign_field_names: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub mobile_app_campaign_field_names: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dynamic_text_campaign_field_names: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cpm_banner_campaign_field_names: Vec<String>,
}

impl Default for CampaignFieldNames {
    fn default() -> Self {
        Self {
            field_names: names(&["Id", "Name"]),
            text_campaign_field_names: Vec::new(),
            mobile_app_campaign_field_names: Vec::new(),
            dynamic_text_campaign_field_names: Vec::new(),
            cpm_banner_campaign_field_names: Vec::new(),
        }
    }
}

/// Field names requested from `ads.get`, with per-ad-type extras.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct AdFieldNames {
    pub field_names: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub text_ad_field_names: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub mobile_app_ad_field_names: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dynamic_text_ad_field_names: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub text_image_ad_field_names: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub mobile_app_image_ad_field_names: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub text_ad_builder_ad_field_names: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub mobile_app_ad_builder_ad_field_names: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cpc_video_ad_builder_ad_field_names: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cpm_banner_ad_builder_ad_field_names: Vec<String>,
}

impl Default for AdFieldNames {
    fn default() -> Self {
        Self {
            field_names: names(&["AdGroupId", "CampaignId", "Id", "Type"]),
            text_ad_field_names: Vec::new(),
            mobile_app_ad_field_names: Vec::new(),
            dynamic_text_ad_field_names: Vec::new(),
            text_image_ad_field_names: Vec::new(),
            mobile_app_image_ad_field_names: Vec::new(),
            text_ad_builder_ad_field_names: Vec::new(),
            mobile_app_ad_builder_ad_field_names: Vec::new(),
            cpc_video_ad_builder_ad_field_names: Vec::new(),
            cpm_banner_ad_builder_ad_field_names: Vec::new(),
        }
    }
}

/// Field names requested from `sitelinks.get`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct SitelinkFieldNames {
    pub field_names: Vec<String>,
}

impl Default for SitelinkFieldNames {
    fn default() -> Self {
        Self {
            field_names: names(&["Id", "Sitelinks"]),
        }
    }
}
