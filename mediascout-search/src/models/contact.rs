//! Sources and extracted contacts

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A web source discovered during the web search stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchSource {
    /// Source identifier
    pub id: Uuid,

    /// Parent search
    pub search_id: Uuid,

    /// Source URL
    pub url: String,

    /// Result title as returned by the search provider
    pub title: String,

    /// Result snippet
    pub snippet: String,

    /// Query text that surfaced this source
    pub query: String,

    /// Provider-reported rank within the query's results
    pub rank: u32,

    /// Discovery time
    pub discovered_at: DateTime<Utc>,
}

/// Human review status of an extracted contact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VerificationStatus {
    /// Not yet reviewed
    Unverified,
    /// Confirmed accurate by a reviewer
    Verified,
    /// Rejected by a reviewer
    Rejected,
}

/// A candidate media contact discovered from a source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedContact {
    /// Contact identifier
    pub id: Uuid,

    /// Parent search
    pub search_id: Uuid,

    /// Contact name
    pub name: String,

    /// Job title, if found
    pub title: Option<String>,

    /// Outlet or publication, if found
    pub outlet: Option<String>,

    /// Email address, if found
    pub email: Option<String>,

    /// Social or profile URL, if found
    pub profile_url: Option<String>,

    /// Extraction confidence (0.0 - 1.0)
    pub confidence: f64,

    /// Relevance to the originating query (0.0 - 1.0)
    pub relevance: f64,

    /// Data completeness quality (0.0 - 1.0)
    pub quality: f64,

    /// Review status
    pub verification: VerificationStatus,

    /// URL the contact was extracted from
    pub source_url: String,

    /// Extraction method (e.g. model identifier)
    pub extraction_method: String,

    /// Extraction time
    pub extracted_at: DateTime<Utc>,
}
