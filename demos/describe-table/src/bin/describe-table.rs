use describe_table::{handler, table_name_from, DynamoDb};
use lambda_runtime::{service_fn, Error, LambdaEvent};
use serde_json::Value;
use std::env;

#[tokio::main]
async fn main() -> Result<(), Error> {
    simple_logger::init_with_level(log::Level::Info).expect("Failed to init logger");

    let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let client = DynamoDb::new(aws_sdk_dynamodb::Client::new(&config));
    let client = &client;

    lambda_runtime::run(service_fn(move |_event: LambdaEvent<Value>| async move {
        handler(client, table_name_from(|key| env::var(key).ok()))
            .await
            .map(|_| ())
    }))
    .await
}
