//! Zone-aware matching.
//!
//! [`ZoneNode`] decorates the stock radix node: for full three-dimension
//! routes it rewrites the match result with zone-file semantics before
//! the adapter composes the handler chain. Name leaves contribute their
//! middleware but never their handlers; RRset leaves get wrapped with a
//! protocol middleware chosen by qtype; missing RRsets cascade through
//! CNAME, NS and SOA lookups inside the same name's subtree. All of this
//! happens on match-time snapshots — the tree itself is never mutated.
//!
//! The protocol middleware re-enter the router through the root zone
//! node to chase CNAME targets, resolve NS glue addresses and attach
//! apex NS records, which is why they can only be constructed on the
//! root.

use std::sync::{Arc, Weak};

use hickory_proto::op::ResponseCode;
use hickory_proto::rr::{Name, RData, RecordType};

use crate::router::{BreedFn, Key, Leaf, MatchedLeaf, Node, RadixNode};

use super::handler::{compose, ArcHandler, MultiHandler, Request, ResponseWriter, NO_ERROR};
use super::middleware::ArcMiddleware;
use super::route::Route;

type DnsLeaf = Arc<Leaf<ArcHandler, ArcMiddleware>>;
type DnsMatch = MatchedLeaf<ArcHandler, ArcMiddleware>;

pub(crate) struct ZoneNode {
    inner: Arc<RadixNode<ArcHandler, ArcMiddleware>>,
    weak_self: Weak<ZoneNode>,
}

impl ZoneNode {
    fn create(up: Option<DnsLeaf>) -> Arc<Self> {
        Arc::new_cyclic(|weak_self| Self {
            inner: RadixNode::create(up),
            weak_self: weak_self.clone(),
        })
    }

    /// A breed factory producing zone nodes at every dimension.
    pub(crate) fn breed() -> BreedFn<ArcHandler, ArcMiddleware> {
        Arc::new(|up| -> Arc<dyn Node<ArcHandler, ArcMiddleware>> { ZoneNode::create(up) })
    }

    /// The zone cascade for a full `[qname, qtype, qclass]` route.
    fn zone_match(&self, route: &[Key]) -> Vec<DnsMatch> {
        let qtype = route[1].labels()[0].text().to_string();
        let type_class = &route[1..];
        let qclass = route[2].clone();

        let name_leaves = self.inner.match_leaves(&route[0]);
        if name_leaves.is_empty() {
            return self.name_error_fallback(&route[0], &qclass);
        }

        let mut out = Vec::new();
        for name_leaf in name_leaves {
            let down = name_leaf.down().cloned();
            let mut v: Vec<DnsMatch> = match &down {
                Some(down) => down.match_route(type_class),
                None => Vec::new(),
            };

            let mut no_data = !v.iter().any(|m| !m.handlers.is_empty());

            // An exactly matching RRset: wrap its handlers per qtype.
            for m in v.iter_mut() {
                if m.handlers.is_empty() {
                    continue;
                }
                let wrapper = match qtype.as_str() {
                    "CNAME" => None,
                    "NS" => Some(self.glue_middleware(false)),
                    "SOA" => Some(self.soa_middleware(false)),
                    _ => Some(self.cname_middleware(&qtype)),
                };
                if let Some(mw) = wrapper {
                    wrap_leaf(m, &mw);
                }
            }

            // The name exists but carries no RRset for this qtype.
            if no_data {
                if let Some(down) = &down {
                    match qtype.as_str() {
                        "CNAME" | "NS" => {}
                        "SOA" => {} // resolved by the SOA lookup below
                        _ => {
                            let mut found = down
                                .match_route(&[single_type_key("CNAME"), qclass.clone()]);
                            if wrap_found(&mut found, &self.cname_middleware(&qtype)) {
                                no_data = false;
                                v.append(&mut found);
                            } else {
                                let mut found = down
                                    .match_route(&[single_type_key("NS"), qclass.clone()]);
                                if wrap_found(&mut found, &self.glue_middleware(true)) {
                                    no_data = false;
                                    v.append(&mut found);
                                }
                            }
                        }
                    }

                    if no_data {
                        let mut found =
                            down.match_route(&[single_type_key("SOA"), qclass.clone()]);
                        let soa_found = wrap_found(&mut found, &self.soa_middleware(false));
                        if soa_found {
                            no_data = false;
                        }
                        if qtype == "SOA" || soa_found {
                            v.append(&mut found);
                        }
                    }
                }
            }

            // The name leaf keeps its middleware on the composition path
            // but never its handlers; a name with no data at all answers
            // an empty NOERROR instead of a refusal.
            let middleware = name_leaf.middleware();
            let handlers: Vec<ArcHandler> = if no_data {
                vec![Arc::new(NO_ERROR)]
            } else {
                Vec::new()
            };
            if !handlers.is_empty() || !middleware.is_empty() {
                out.push(MatchedLeaf {
                    leaf: name_leaf.clone(),
                    handlers,
                    middleware,
                });
            }
            out.append(&mut v);
        }
        out
    }

    /// No name leaf matched at all: serve the deepest registered
    /// ancestor's SOA through the soa middleware in name-error mode,
    /// producing NXDOMAIN with the SOA in Authority.
    fn name_error_fallback(&self, name_key: &Key, qclass: &Key) -> Vec<DnsMatch> {
        for ancestor in self.inner.path_leaves(name_key).into_iter().rev() {
            let Some(down) = ancestor.down() else {
                continue;
            };
            let mut found = down.match_route(&[single_type_key("SOA"), qclass.clone()]);
            if wrap_found(&mut found, &self.soa_middleware(true)) {
                return found;
            }
        }
        Vec::new()
    }

    fn require_root(&self) {
        assert!(
            self.inner.up().is_none(),
            "zone middleware requires the root node"
        );
    }

    /// Chases in-zone CNAME answers: every CNAME record the wrapped
    /// handler emits triggers a re-query for the target name with the
    /// original qtype, and the answers are merged.
    fn cname_middleware(&self, qtype: &str) -> ArcMiddleware {
        self.require_root();
        let root = self.weak_self.clone();
        let qtype = qtype.to_string();
        Arc::new(move |h: ArcHandler| -> ArcHandler {
            if qtype == "CNAME" {
                return h;
            }
            let root = root.clone();
            let qtype = qtype.clone();
            Arc::new(move |w: &mut ResponseWriter, req: &Request| {
                let Some(root) = root.upgrade() else {
                    return;
                };
                let mut inner = ResponseWriter::new();
                h.serve_dns(&mut inner, req);

                let targets: Vec<Name> = inner
                    .answers()
                    .iter()
                    .filter_map(|rr| match rr.data() {
                        Some(RData::CNAME(cname)) => Some(cname.0.clone()),
                        _ => None,
                    })
                    .collect();

                let mut chased = ResponseWriter::new();
                for target in targets {
                    let lookup = Route {
                        name: target.to_utf8().to_lowercase(),
                        rtype: qtype.clone(),
                        class: String::new(),
                        literal: true,
                    };
                    let Ok(keys) = lookup.to_keys() else {
                        continue;
                    };
                    let original_qtype = req
                        .query()
                        .map(|q| q.query_type())
                        .unwrap_or(RecordType::A);
                    let sub = Request::question(target, original_qtype);
                    compose(root.match_route(&keys)).serve_dns(&mut chased, &sub);
                }

                let _ = inner.write_msg(&chased.to_message());
                let _ = inner.write_msg(&req.message);
                let _ = w.write_msg(&inner.to_message());
            })
        })
    }

    /// Resolves glue for NS answers: every NS target gets re-queried for
    /// its A and AAAA records, appended as Additional. In delegated mode
    /// the answer becomes a referral: Answer and Authority swap and the
    /// authoritative bit is cleared.
    fn glue_middleware(&self, delegated: bool) -> ArcMiddleware {
        self.require_root();
        let root = self.weak_self.clone();
        Arc::new(move |h: ArcHandler| -> ArcHandler {
            let root = root.clone();
            Arc::new(move |w: &mut ResponseWriter, req: &Request| {
                let Some(root) = root.upgrade() else {
                    return;
                };
                let mut inner = ResponseWriter::new();
                h.serve_dns(&mut inner, req);

                let targets: Vec<Name> = inner
                    .answers()
                    .iter()
                    .chain(inner.authority().iter())
                    .filter_map(|rr| match rr.data() {
                        Some(RData::NS(ns)) => Some(ns.0.clone()),
                        _ => None,
                    })
                    .collect();

                let mut glue = ResponseWriter::new();
                for target in targets {
                    for rtype in [RecordType::A, RecordType::AAAA] {
                        let lookup = Route {
                            name: target.to_utf8().to_lowercase(),
                            rtype: rtype.to_string(),
                            class: String::new(),
                            literal: true,
                        };
                        let Ok(keys) = lookup.to_keys() else {
                            continue;
                        };
                        let sub = Request::question(target.clone(), rtype);
                        compose(root.match_route(&keys)).serve_dns(&mut glue, &sub);
                    }
                }

                if delegated {
                    inner.swap_answer_authority();
                    w.set_authoritative(false);
                }
                for rr in glue.answers().iter().cloned() {
                    inner.extra(rr);
                }
                let _ = inner.write_msg(&req.message);
                let _ = w.write_msg(&inner.to_message());
            })
        })
    }

    /// Normalizes SOA responses: an SOA answered for the query name
    /// itself gains the zone's NS records in Authority; an SOA for
    /// another name moves to Authority. In name-error mode the final
    /// response code becomes NXDOMAIN.
    fn soa_middleware(&self, name_error: bool) -> ArcMiddleware {
        self.require_root();
        let root = self.weak_self.clone();
        Arc::new(move |h: ArcHandler| -> ArcHandler {
            let root = root.clone();
            Arc::new(move |w: &mut ResponseWriter, req: &Request| {
                let Some(root) = root.upgrade() else {
                    return;
                };
                let mut inner = ResponseWriter::new();
                h.serve_dns(&mut inner, req);

                let soa_name = inner.answers().first().and_then(|rr| match rr.data() {
                    Some(RData::SOA(_)) => Some(rr.name().clone()),
                    _ => None,
                });
                if inner.authority().is_empty() {
                    if let Some(soa_name) = soa_name {
                        let for_qname = req.query().is_some_and(|q| q.name() == &soa_name);
                        if for_qname {
                            let lookup = Route {
                                name: soa_name.to_utf8().to_lowercase(),
                                rtype: "NS".into(),
                                class: String::new(),
                                literal: true,
                            };
                            if let Ok(keys) = lookup.to_keys() {
                                let mut ns = ResponseWriter::new();
                                let sub = Request::question(soa_name, RecordType::NS);
                                compose(root.match_route(&keys)).serve_dns(&mut ns, &sub);
                                for rr in ns.answers().iter().cloned() {
                                    inner.ns(rr);
                                }
                                for rr in ns.additionals().iter().cloned() {
                                    inner.extra(rr);
                                }
                            }
                        } else {
                            inner.swap_answer_authority();
                        }
                    }
                }

                let _ = inner.write_msg(&req.message);
                if name_error {
                    w.set_response_code(ResponseCode::NXDomain);
                }
                let _ = w.write_msg(&inner.to_message());
            })
        })
    }
}

impl Node<ArcHandler, ArcMiddleware> for ZoneNode {
    fn make(
        &self,
        route: &[Key],
        breed: &BreedFn<ArcHandler, ArcMiddleware>,
    ) -> DnsLeaf {
        self.inner.make(route, breed)
    }

    fn get(&self, route: &[Key]) -> Option<DnsLeaf> {
        self.inner.get(route)
    }

    fn delete(&self, leaf: &DnsLeaf) {
        self.inner.delete(leaf)
    }

    fn leaves(&self) -> Vec<DnsLeaf> {
        self.inner.leaves()
    }

    fn up(&self) -> Option<DnsLeaf> {
        self.inner.up()
    }

    fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    fn match_route(&self, route: &[Key]) -> Vec<DnsMatch> {
        if route.len() > 2 {
            self.zone_match(route)
        } else {
            self.inner.match_route(route)
        }
    }
}

fn single_type_key(rtype: &str) -> Key {
    Key::literal_tokens([rtype])
}

/// Wraps each matched leaf's handlers with the middleware, returning
/// whether any leaf carried handlers at all.
fn wrap_found(matches: &mut [DnsMatch], middleware: &ArcMiddleware) -> bool {
    let mut found = false;
    for m in matches.iter_mut() {
        if m.handlers.is_empty() {
            continue;
        }
        found = true;
        wrap_leaf(m, middleware);
    }
    found
}

fn wrap_leaf(m: &mut DnsMatch, middleware: &ArcMiddleware) {
    let wrapped = middleware.wrap(Arc::new(MultiHandler(m.handlers.clone())));
    m.handlers = vec![wrapped];
}
