//! DNS adapter scenarios: wildcard names, zone cascade, and RCODE
//! handling.

use std::net::Ipv4Addr;
use std::str::FromStr;

use hickory_proto::op::{Message, Query, ResponseCode};
use hickory_proto::rr::rdata::{A, CNAME, NS, SOA, SRV, TXT};
use hickory_proto::rr::{Name, RData, Record, RecordType};

use polymux::dns::{Request, ResponseWriter, Route, Router};

fn name(s: &str) -> Name {
    Name::from_utf8(s).unwrap()
}

fn query(router: &Router, qname: &str, rtype: RecordType) -> Message {
    let mut msg = Message::new();
    msg.set_id(42);
    msg.add_query(Query::query(name(qname), rtype));
    let req = Request::new(msg);
    let mut w = ResponseWriter::network();
    router.serve_dns(&mut w, &req);
    w.finish(&req).expect("one response per query")
}

fn txt_answers(msg: &Message) -> Vec<String> {
    msg.answers()
        .iter()
        .filter_map(|rr| match rr.data() {
            Some(RData::TXT(txt)) => Some(
                txt.txt_data()
                    .iter()
                    .map(|part| String::from_utf8_lossy(part).into_owned())
                    .collect::<String>(),
            ),
            _ => None,
        })
        .collect()
}

/// Registers a handler answering a TXT record tagged with the route
/// string, mirroring how the scenarios identify which route answered.
fn tag_route(router: &Router, route: Route) {
    let tag = route.to_string();
    router
        .handle(route, move |w: &mut ResponseWriter, req: &Request| {
            let qname = req.query().map(|q| q.name().clone()).unwrap_or_default();
            w.answer(Record::from_rdata(
                qname,
                0,
                RData::TXT(TXT::new(vec![tag.clone()])),
            ));
        })
        .unwrap();
}

#[test]
fn handle_close_cycles() {
    let router = Router::new();
    for _ in 0..2 {
        let close = router
            .handle(Route::default(), |_: &mut ResponseWriter, _: &Request| {})
            .unwrap();
        close.close();
    }
    assert!(router.routes().is_empty());
}

#[test]
fn wildcard_names_answer_for_unregistered_labels() {
    let router = Router::new();
    for n in ["", "v1", "v1.x", "v1.*", "v[2-3]", "v4.**.x", "v4.*.**.x"] {
        tag_route(&router, Route::name(n));
    }
    assert_eq!(router.routes().len(), 7);

    let cases: &[(&str, &[&str])] = &[
        ("v1.", &["v1 A IN"]),
        ("v1.x.", &["v1.x A IN", "v1.* A IN"]),
        ("v1.y.", &["v1.* A IN"]),
        ("v2.", &["v[2-3] A IN"]),
        ("v4.x.", &["v4.**.x A IN"]),
        ("v4.1.x.", &["v4.*.**.x A IN", "v4.**.x A IN"]),
    ];
    for (qname, expected) in cases {
        let response = query(&router, qname, RecordType::A);
        assert_eq!(&txt_answers(&response), expected, "qname {qname}");
        assert_eq!(response.response_code(), ResponseCode::NoError);
        assert_eq!(response.id(), 42);
    }
}

#[test]
fn srv_zone_with_glue_target() {
    let router = Router::new();
    let target = name("localhost.");

    let srv = Record::from_rdata(
        name("_http._tcp.example.com."),
        300,
        RData::SRV(SRV::new(0, 0, 8080, target.clone())),
    );
    router
        .handle(
            Route {
                name: "**.example.com.".into(),
                rtype: "SRV".into(),
                ..Route::default()
            },
            move |w: &mut ResponseWriter, _: &Request| {
                w.answer(srv.clone());
            },
        )
        .unwrap();

    let a = Record::from_rdata(target, 300, RData::A(A(Ipv4Addr::LOCALHOST)));
    router
        .handle(
            Route {
                name: "localhost.".into(),
                rtype: "A".into(),
                ..Route::default()
            },
            move |w: &mut ResponseWriter, _: &Request| {
                w.answer(a.clone());
            },
        )
        .unwrap();

    let response = query(&router, "foo.example.com.", RecordType::SRV);
    let srv_target = response
        .answers()
        .iter()
        .find_map(|rr| match rr.data() {
            Some(RData::SRV(srv)) => Some(srv.target().clone()),
            _ => None,
        })
        .expect("SRV answer");
    assert_eq!(srv_target, name("localhost."));

    let response = query(&router, "localhost.", RecordType::A);
    let addrs: Vec<Ipv4Addr> = response
        .answers()
        .iter()
        .filter_map(|rr| match rr.data() {
            Some(RData::A(a)) => Some(a.0),
            _ => None,
        })
        .collect();
    assert_eq!(addrs, [Ipv4Addr::LOCALHOST]);
}

#[test]
fn cname_is_chased_in_zone() {
    let router = Router::new();

    let cname = Record::from_rdata(
        name("alias.test."),
        60,
        RData::CNAME(CNAME(name("target.test."))),
    );
    router
        .handle(
            Route {
                name: "alias.test.".into(),
                rtype: "CNAME".into(),
                ..Route::default()
            },
            move |w: &mut ResponseWriter, _: &Request| {
                w.answer(cname.clone());
            },
        )
        .unwrap();

    let a = Record::from_rdata(
        name("target.test."),
        60,
        RData::A(A(Ipv4Addr::new(192, 0, 2, 1))),
    );
    router
        .handle(
            Route {
                name: "target.test.".into(),
                rtype: "A".into(),
                ..Route::default()
            },
            move |w: &mut ResponseWriter, _: &Request| {
                w.answer(a.clone());
            },
        )
        .unwrap();

    let response = query(&router, "alias.test.", RecordType::A);
    assert_eq!(response.response_code(), ResponseCode::NoError);
    let types: Vec<RecordType> = response
        .answers()
        .iter()
        .map(|rr| rr.record_type())
        .collect();
    assert_eq!(types, [RecordType::CNAME, RecordType::A]);
}

#[test]
fn missing_rrset_with_ns_becomes_referral_with_glue() {
    let router = Router::new();

    let ns = Record::from_rdata(
        name("deleg.test."),
        60,
        RData::NS(NS(name("ns1.deleg.test."))),
    );
    router
        .handle(
            Route {
                name: "deleg.test.".into(),
                rtype: "NS".into(),
                ..Route::default()
            },
            move |w: &mut ResponseWriter, _: &Request| {
                w.answer(ns.clone());
            },
        )
        .unwrap();

    let glue = Record::from_rdata(
        name("ns1.deleg.test."),
        60,
        RData::A(A(Ipv4Addr::new(192, 0, 2, 53))),
    );
    router
        .handle(
            Route {
                name: "ns1.deleg.test.".into(),
                rtype: "A".into(),
                ..Route::default()
            },
            move |w: &mut ResponseWriter, _: &Request| {
                w.answer(glue.clone());
            },
        )
        .unwrap();

    // No A RRset at the delegated name: the NS answer moves to Authority
    // and its target address arrives as glue.
    let response = query(&router, "deleg.test.", RecordType::A);
    assert!(response.answers().iter().all(|rr| rr.record_type() != RecordType::A
        || rr.name() != &name("deleg.test.")));
    let authority_types: Vec<RecordType> = response
        .name_servers()
        .iter()
        .map(|rr| rr.record_type())
        .collect();
    assert_eq!(authority_types, [RecordType::NS]);
    let glue_addrs: Vec<Ipv4Addr> = response
        .additionals()
        .iter()
        .filter_map(|rr| match rr.data() {
            Some(RData::A(a)) => Some(a.0),
            _ => None,
        })
        .collect();
    assert_eq!(glue_addrs, [Ipv4Addr::new(192, 0, 2, 53)]);
    assert!(!response.authoritative());
}

#[test]
fn nonexistent_name_under_soa_apex_is_nxdomain() {
    let router = Router::new();

    let soa = Record::from_rdata(
        name("example.com."),
        3600,
        RData::SOA(SOA::new(
            name("ns1.example.com."),
            name("admin.example.com."),
            2024010101,
            7200,
            3600,
            1209600,
            300,
        )),
    );
    router
        .handle(
            Route {
                name: "example.com.".into(),
                rtype: "SOA".into(),
                ..Route::default()
            },
            move |w: &mut ResponseWriter, _: &Request| {
                w.answer(soa.clone());
            },
        )
        .unwrap();

    let response = query(&router, "nope.example.com.", RecordType::A);
    assert_eq!(response.response_code(), ResponseCode::NXDomain);
    assert!(response.answers().is_empty());
    let authority_types: Vec<RecordType> = response
        .name_servers()
        .iter()
        .map(|rr| rr.record_type())
        .collect();
    assert_eq!(authority_types, [RecordType::SOA]);
}

#[test]
fn name_with_no_data_answers_empty_noerror() {
    let router = Router::new();
    let a = Record::from_rdata(
        name("exists.test."),
        60,
        RData::A(A(Ipv4Addr::new(192, 0, 2, 7))),
    );
    router
        .handle(
            Route {
                name: "exists.test.".into(),
                rtype: "A".into(),
                ..Route::default()
            },
            move |w: &mut ResponseWriter, _: &Request| {
                w.answer(a.clone());
            },
        )
        .unwrap();

    let response = query(&router, "exists.test.", RecordType::AAAA);
    assert_eq!(response.response_code(), ResponseCode::NoError);
    assert!(response.answers().is_empty());
}

#[test]
fn unknown_names_are_refused() {
    let router = Router::new();
    tag_route(&router, Route::name("known.test."));

    let response = query(&router, "elsewhere.example.", RecordType::A);
    assert_eq!(response.response_code(), ResponseCode::Refused);
}

#[test]
fn any_queries_are_format_errors() {
    let router = Router::new();
    tag_route(&router, Route::name("known.test."));

    let response = query(&router, "known.test.", RecordType::ANY);
    assert_eq!(response.response_code(), ResponseCode::FormErr);
}

#[test]
fn routes_read_back_with_types_and_classes() {
    let router = Router::new();
    tag_route(
        &router,
        Route {
            name: "v1.example.com.".into(),
            rtype: "srv".into(),
            class: "in".into(),
            ..Route::default()
        },
    );

    let routes = router.routes();
    assert_eq!(routes.len(), 1);
    assert_eq!(routes[0].name, "v1.example.com.");
    assert_eq!(routes[0].rtype, "SRV");
    assert_eq!(routes[0].class, "IN");
}

#[test]
fn transport_writer_rejects_second_commit() {
    let router = Router::new();
    tag_route(&router, Route::name("known.test."));

    let mut msg = Message::new();
    msg.add_query(Query::query(name("known.test."), RecordType::A));
    let req = Request::new(msg);

    let mut w = ResponseWriter::network();
    router.serve_dns(&mut w, &req);
    assert!(w.finish(&req).is_ok());
    assert!(w.finish(&req).is_err());
    assert!(w.write_msg(&req.message).is_err());
}

#[test]
fn record_type_strings_round_trip() {
    // The route grammar leans on hickory's type names.
    assert_eq!(RecordType::from_str("SRV").unwrap(), RecordType::SRV);
    assert_eq!(RecordType::SOA.to_string(), "SOA");
}
