//! Scenario discovery
//!
//! Consumes the parser's envelope stream, classifies every pickle through
//! the [`PickleFilter`] and orders the accepted set.

mod order;

pub use order::{OrderError, OrderPolicy};

use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

use crate::filter::PickleFilter;
use crate::models::{relative_uri, Envelope, GherkinDocument, Pickle, Source};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiscoveryError {
    #[error("Parse error in '{uri}': {message}")]
    Parse { uri: String, message: String },
}

/// Observable classification log, in arrival order
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DiscoveryEvent {
    Source { uri: String },
    GherkinDocument { uri: String },
    Pickle { id: String },
    PickleAccepted { id: String },
    PickleRejected { id: String },
}

/// Everything the parser reported, indexed for lookups by the projections
#[derive(Clone, Debug, Default)]
pub struct Catalog {
    pub sources: Vec<Source>,
    pub documents: Vec<GherkinDocument>,
    pickles: Vec<Pickle>,
    pickle_index: HashMap<String, usize>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_document(&mut self, document: GherkinDocument) {
        self.documents.push(document);
    }

    /// Register a pickle; a repeated id replaces the earlier pickle in place
    pub fn add_pickle(&mut self, pickle: Pickle) {
        match self.pickle_index.get(&pickle.id) {
            Some(&i) => self.pickles[i] = pickle,
            None => {
                self.pickle_index.insert(pickle.id.clone(), self.pickles.len());
                self.pickles.push(pickle);
            }
        }
    }

    pub fn pickle(&self, id: &str) -> Option<&Pickle> {
        self.pickle_index.get(id).map(|&i| &self.pickles[i])
    }

    /// All pickles in arrival order, accepted or not
    pub fn pickles(&self) -> &[Pickle] {
        &self.pickles
    }

    pub fn document(&self, uri: &str) -> Option<&GherkinDocument> {
        self.documents.iter().find(|d| d.uri == uri)
    }
}

/// Outcome of discovery
#[derive(Clone, Debug, Default)]
pub struct Discovery {
    pub catalog: Catalog,
    /// Accepted pickle ids in execution order
    pub accepted: Vec<String>,
    pub events: Vec<DiscoveryEvent>,
    /// Seed used by a random ordering policy
    pub seed: Option<String>,
}

impl Discovery {
    pub fn accepted_pickles(&self) -> impl Iterator<Item = &Pickle> {
        self.accepted.iter().filter_map(|id| self.catalog.pickle(id))
    }

    pub fn rejected_count(&self) -> usize {
        self.catalog.pickles().len() - self.accepted.len()
    }
}

/// Run the envelope stream through filter and orderer.
///
/// A diagnostic attachment aborts before anything is ordered.
pub fn discover<I>(
    envelopes: I,
    filter: &PickleFilter,
    policy: &OrderPolicy,
    cwd: &Path,
) -> Result<Discovery, DiscoveryError>
where
    I: IntoIterator<Item = Envelope>,
{
    let mut discovery = Discovery::default();

    for envelope in envelopes {
        match envelope {
            Envelope::Source(source) => {
                discovery.events.push(DiscoveryEvent::Source {
                    uri: source.uri.clone(),
                });
                discovery.catalog.sources.push(source);
            }
            Envelope::GherkinDocument(document) => {
                discovery.events.push(DiscoveryEvent::GherkinDocument {
                    uri: document.uri.clone(),
                });
                discovery.catalog.add_document(document);
            }
            Envelope::Pickle(pickle) => {
                let id = pickle.id.clone();
                let repeated = discovery.catalog.pickle(&id).is_some();
                if repeated {
                    debug!("Pickle '{id}' repeated, replacing the earlier one");
                }
                discovery.events.push(DiscoveryEvent::Pickle { id: id.clone() });
                if filter.matches(&pickle) {
                    discovery.events.push(DiscoveryEvent::PickleAccepted { id: id.clone() });
                    if !(repeated && discovery.accepted.contains(&id)) {
                        discovery.accepted.push(id);
                    }
                } else {
                    if repeated {
                        discovery.accepted.retain(|accepted| *accepted != id);
                    }
                    discovery.events.push(DiscoveryEvent::PickleRejected { id });
                }
                discovery.catalog.add_pickle(pickle);
            }
            Envelope::Attachment(attachment) => {
                return Err(DiscoveryError::Parse {
                    uri: relative_uri(cwd, &attachment.source.uri),
                    message: attachment.data,
                });
            }
        }
    }

    discovery.seed = policy.apply(&mut discovery.accepted);

    info!(
        "Discovered {} pickles ({} accepted, {} rejected) in {} documents, order: {}",
        discovery.catalog.pickles().len(),
        discovery.accepted.len(),
        discovery.rejected_count(),
        discovery.catalog.documents.len(),
        policy
    );
    debug!(order = ?discovery.accepted, "Execution order");

    Ok(discovery)
}
