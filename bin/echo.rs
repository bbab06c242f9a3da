//! Run a few round trips through in-process endpoints.
//!
//! This is a simple example to demonstrate how to use the [`courier`] library.

use clap::Parser;
use serde_json::{json, Value};
use std::sync::Arc;

use courier::{
    answer,
    runtime::{LocalRuntime, ScopedMessenger, SendOptions},
    CliArgs, Courier, CourierError, Endpoint, EndpointRegistry, LocalPort, Target,
};

/// The far side of every destination: echo the payload back, unless it asks for
/// a failure.
fn echo(name: String) -> impl Fn(Value) -> Result<Value, Value> + Send + Sync + 'static {
    move |payload| match payload.get("fail").and_then(Value::as_bool) {
        Some(true) => Err(json!(format!("{name} refused {payload}"))),
        _ => Ok(json!({ "from": name, "echo": payload })),
    }
}

/// Send `count` correlated requests to every destination, all at once.
async fn round_trips(
    courier: &Courier,
    names: &[String],
    count: usize,
    timeout: tokio::time::Duration,
) -> Vec<(String, Result<Value, CourierError>)> {
    let requests = names.iter().flat_map(|name| {
        (0..count).map(move |index| async move {
            let payload = json!({ "index": index, "fail": index % 3 == 2 });
            (
                name.clone(),
                courier.send_timeout(payload, name, timeout).await,
            )
        })
    });

    futures::future::join_all(requests).await
}

async fn run(args: CliArgs) -> Result<(), CourierError> {
    let names = args.destination_names()?;

    let registry = EndpointRegistry::new_arc();
    for name in &names {
        let endpoint: Arc<dyn Endpoint> = LocalPort::new_arc(name);
        answer(&endpoint, echo(name.clone()));
        registry.register(endpoint);
    }

    let courier = Courier::new_arc(registry);

    for (name, result) in round_trips(&courier, &names, args.count, args.timeout()).await {
        match result {
            Ok(payload) => println!("{name} answered: {payload}"),
            Err(err) => println!("{name} failed: {err}"),
        }
    }

    courier.only_send(json!({ "note": "no reply expected" }), &names[0])?;
    println!("Fire-and-forget message posted to {}.", names[0]);

    let posted = courier.dispatch(json!({ "note": "to everyone" }), &Target::All)?;
    println!("Broadcast posted to {posted} destination(s).");

    let runtime = LocalRuntime::new_arc();
    let messenger = ScopedMessenger::new(&args.scope, runtime.clone());
    messenger.listen(|payload| async move {
        Ok(json!({ "greeting": "hey yourself", "heard": payload }))
    });

    let reply = messenger
        .send(json!({ "greeting": "hey there" }), SendOptions::new())
        .await?;
    println!("Scope {:?} answered: {reply}", messenger.scope());

    let stray = ScopedMessenger::new("nobody", runtime);
    match stray.send("anyone?", SendOptions::new()).await {
        Ok(reply) => println!("Scope \"nobody\" unexpectedly answered: {reply}"),
        Err(err) => println!("Scope \"nobody\" failed as expected: {err}"),
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), CourierError> {
    let args = CliArgs::parse();

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            println!("Interrupt received, gracefully shutting down.");
            Ok(())
        },
        result = run(args) => {
            println!("Finished.");
            result
        }
    }
}
