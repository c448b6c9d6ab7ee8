use criterion::{Criterion, criterion_group, criterion_main};
use http::Method;
use sluice_web::router::RouteMatcher;
use sluice_web::{ServerRequest, handler_fn};
use std::hint::black_box;

fn matcher() -> RouteMatcher {
    let mut matcher = RouteMatcher::new();
    for i in 0..20 {
        matcher.get(&format!("/static/page{i}.html"), handler_fn(|_request: ServerRequest| {})).unwrap();
        matcher.get(&format!("/api/v{i}/users/:id"), handler_fn(|_request: ServerRequest| {})).unwrap();
        matcher.post_regex(&format!(r"/upload/{i}/(?P<name>[^/]+)"), handler_fn(|_request: ServerRequest| {})).unwrap();
    }
    matcher.all("/health", handler_fn(|_request: ServerRequest| {})).unwrap();
    matcher
}

fn bench_route_matching(c: &mut Criterion) {
    let matcher = matcher();
    let mut group = c.benchmark_group("route_matching");

    group.bench_function("literal_first", |b| {
        b.iter(|| black_box(matcher.at(&Method::GET, black_box("/static/page0.html"))));
    });

    group.bench_function("params_last", |b| {
        b.iter(|| black_box(matcher.at(&Method::GET, black_box("/api/v19/users/42"))));
    });

    group.bench_function("regex_last", |b| {
        b.iter(|| black_box(matcher.at(&Method::POST, black_box("/upload/19/report.pdf"))));
    });

    group.bench_function("any_method_last", |b| {
        b.iter(|| black_box(matcher.at(&Method::GET, black_box("/health"))));
    });

    group.bench_function("miss", |b| {
        b.iter(|| black_box(matcher.at(&Method::GET, black_box("/nothing/here"))));
    });

    group.finish();
}

criterion_group!(benches, bench_route_matching);
criterion_main!(benches);
