use chrono::{NaiveDate, Utc};
use hmac::{Hmac, Mac};
use sea_orm::{ActiveModelTrait, Set};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::sync::Arc;
use strum::Display;
use tracing::{instrument, warn};
use url::Url;
use uuid::Uuid;

use crate::db::DbPool;
use crate::entities::visit;

type HmacSha256 = Hmac<Sha256>;

/// Number of hex characters kept from the fingerprint digest; plenty of
/// entropy for a per-day visitor token while staying cookie-sized.
const FINGERPRINT_LEN: usize = 32;

/// Hosts classified as organic search referrers
const SEARCH_ENGINE_HOSTS: &[&str] = &[
    "google.", "bing.com", "yahoo.", "duckduckgo.com", "baidu.com", "yandex.", "ecosia.org",
    "search.brave.com",
];

/// Hosts classified as social referrers
const SOCIAL_HOSTS: &[&str] = &[
    "facebook.com", "fb.com", "instagram.com", "twitter.com", "x.com", "t.co", "linkedin.com",
    "lnkd.in", "pinterest.", "tiktok.com", "reddit.com", "threads.net", "line.me",
];

/// Hosts classified as video referrers
const VIDEO_HOSTS: &[&str] = &[
    "youtube.com", "youtu.be", "vimeo.com", "twitch.tv", "dailymotion.com", "nicovideo.jp",
];

/// Traffic source buckets, first match wins in declaration order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
pub enum SourceType {
    Direct,
    #[strum(serialize = "Organic Search")]
    #[serde(rename = "Organic Search")]
    OrganicSearch,
    Social,
    Video,
    Referral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
pub enum DeviceType {
    Mobile,
    Tablet,
    Desktop,
}

/// Result of classifying one request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classification {
    pub visitor_id: String,
    pub session_id: String,
    pub source_type: SourceType,
    pub device_type: DeviceType,
}

/// A visit to persist, produced by the tracking endpoint
#[derive(Debug, Clone)]
pub struct VisitInput {
    pub funnel_id: Uuid,
    pub funnel_step_id: Option<Uuid>,
    pub user_agent: String,
    pub ip_address: String,
    pub referrer: Option<String>,
}

/// Derives visitor fingerprints and traffic classifications, and appends
/// visit records.
#[derive(Clone)]
pub struct TrackingService {
    db: Arc<DbPool>,
    fingerprint_key: String,
}

impl TrackingService {
    pub fn new(db: Arc<DbPool>, fingerprint_key: String) -> Self {
        Self { db, fingerprint_key }
    }

    /// Classifies a request. Deterministic: the same inputs always produce
    /// the same visitor id, and crossing a day boundary rotates it. The
    /// fingerprint is a one-way keyed hash; raw ip/user-agent are not
    /// recoverable from it. Two visitors sharing ip, user agent and day
    /// collapse to one fingerprint, a known limitation of the model.
    pub fn classify(
        &self,
        user_agent: &str,
        ip_address: &str,
        referrer: Option<&str>,
        as_of: NaiveDate,
    ) -> Classification {
        let visitor_id = self.fingerprint(ip_address, user_agent, as_of);
        Classification {
            session_id: visitor_id.clone(),
            visitor_id,
            source_type: classify_source(referrer),
            device_type: classify_device(user_agent),
        }
    }

    fn fingerprint(&self, ip_address: &str, user_agent: &str, as_of: NaiveDate) -> String {
        let mut mac = HmacSha256::new_from_slice(self.fingerprint_key.as_bytes())
            .expect("HMAC accepts keys of any length");
        mac.update(ip_address.as_bytes());
        mac.update(b"|");
        mac.update(user_agent.as_bytes());
        mac.update(b"|");
        mac.update(as_of.to_string().as_bytes());
        let digest = hex::encode(mac.finalize().into_bytes());
        digest[..FINGERPRINT_LEN].to_string()
    }

    /// Classifies and appends exactly one visit record. Persistence failure
    /// is logged and swallowed: tracking must never degrade the page the
    /// visitor is looking at.
    #[instrument(skip(self, input), fields(funnel_id = %input.funnel_id))]
    pub async fn record_visit(&self, input: VisitInput) -> Option<Classification> {
        let classification = self.classify(
            &input.user_agent,
            &input.ip_address,
            input.referrer.as_deref(),
            Utc::now().date_naive(),
        );

        let row = visit::ActiveModel {
            id: Set(Uuid::new_v4()),
            visitor_id: Set(classification.visitor_id.clone()),
            session_id: Set(classification.session_id.clone()),
            funnel_id: Set(input.funnel_id),
            funnel_step_id: Set(input.funnel_step_id),
            user_agent: Set(input.user_agent),
            referrer: Set(input.referrer),
            source_type: Set(classification.source_type.to_string()),
            device_type: Set(classification.device_type.to_string()),
            created_at: Set(Utc::now()),
        };

        match row.insert(&*self.db).await {
            Ok(_) => {
                crate::metrics::VISITS_RECORDED.inc();
                Some(classification)
            }
            Err(e) => {
                warn!(error = %e, "failed to persist visit record");
                None
            }
        }
    }
}

/// Ordered referrer classification, first match wins.
fn classify_source(referrer: Option<&str>) -> SourceType {
    let Some(referrer) = referrer.map(str::trim).filter(|r| !r.is_empty()) else {
        return SourceType::Direct;
    };

    let Some(host) = Url::parse(referrer).ok().and_then(|u| u.host_str().map(str::to_string))
    else {
        // Unparseable referrers still represent an external navigation
        return SourceType::Referral;
    };
    let host = host.to_ascii_lowercase();

    if host_matches(&host, SEARCH_ENGINE_HOSTS) {
        SourceType::OrganicSearch
    } else if host_matches(&host, SOCIAL_HOSTS) {
        SourceType::Social
    } else if host_matches(&host, VIDEO_HOSTS) {
        SourceType::Video
    } else {
        SourceType::Referral
    }
}

fn host_matches(host: &str, patterns: &[&str]) -> bool {
    patterns.iter().any(|pattern| {
        if pattern.ends_with('.') {
            // TLD-agnostic pattern: "google." matches google.com and
            // www.google.co.jp but not notgoogle.com
            host.starts_with(pattern) || host.contains(&format!(".{pattern}"))
        } else {
            host == *pattern || host.ends_with(&format!(".{pattern}"))
        }
    })
}

/// Mobile substring takes precedence over tablet, tablet over desktop.
fn classify_device(user_agent: &str) -> DeviceType {
    let ua = user_agent.to_ascii_lowercase();
    if ua.contains("mobile") {
        DeviceType::Mobile
    } else if ua.contains("tablet") || ua.contains("ipad") {
        DeviceType::Tablet
    } else {
        DeviceType::Desktop
    }
}
