use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion};
use genl_control::config::ControlConfig;
use genl_control::core::message::Endpoint;
use genl_control::protocol::Family;
use genl_control::service::RequestBuilder;
use genl_control::transport::LoopbackRuntime;

fn bench_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch");

    let runtime = Arc::new(LoopbackRuntime::new());
    let family = Family::register(Arc::clone(&runtime), &ControlConfig::default()).unwrap();
    runtime.bind(1).unwrap();
    let requests = RequestBuilder::new(family.id().unwrap(), 0);

    let get_info = requests.get_info_request(Endpoint::new(1, 1)).unwrap();
    group.bench_function("get_info", |b| {
        b.iter(|| {
            family.handle(&get_info).unwrap();
            runtime.recv(1).unwrap()
        })
    });

    let set_param = requests.set_param_request(Endpoint::new(1, 2), 3).unwrap();
    group.bench_function("set_param", |b| {
        b.iter(|| {
            family.handle(&set_param).unwrap();
            runtime.recv(1).unwrap()
        })
    });

    let mut malformed = get_info.to_vec();
    malformed[16] = 9;
    group.bench_function("reject_unknown_command", |b| {
        b.iter(|| family.handle(&malformed).is_err())
    });

    group.finish();
}

criterion_group!(benches, bench_dispatch);
criterion_main!(benches);
