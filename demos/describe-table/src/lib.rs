use lambda_runtime::Error;
use std::fmt::Debug;
use std::future::Future;

pub const TABLE_NAME_VAR: &str = "TABLE_NAME";

/// The one call the handler makes against the database.
pub trait TableDescriber {
    type Output: Debug;

    fn describe(
        &self,
        table_name: Option<String>,
    ) -> impl Future<Output = Result<Self::Output, Error>> + Send;
}

pub struct DynamoDb {
    client: aws_sdk_dynamodb::Client,
}

impl DynamoDb {
    pub fn new(client: aws_sdk_dynamodb::Client) -> Self {
        DynamoDb { client }
    }
}

impl TableDescriber for DynamoDb {
    type Output = aws_sdk_dynamodb::operation::describe_table::DescribeTableOutput;

    fn describe(
        &self,
        table_name: Option<String>,
    ) -> impl Future<Output = Result<Self::Output, Error>> + Send {
        let request = self.client.describe_table().set_table_name(table_name);
        async move { Ok(request.send().await?) }
    }
}

/// Looks up `TABLE_NAME`; an unset variable gives `None`, which is still sent.
pub fn table_name_from<F>(lookup: F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(TABLE_NAME_VAR)
}

/// Describes the table once and logs the response. Service errors are returned as is.
pub async fn handler<D: TableDescriber>(
    client: &D,
    table_name: Option<String>,
) -> Result<D::Output, Error> {
    let response = client.describe(table_name).await?;
    log::info!("{:?}", response);
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct RecordingDescriber {
        calls: Mutex<Vec<Option<String>>>,
        fail: bool,
    }

    impl RecordingDescriber {
        fn new(fail: bool) -> Self {
            RecordingDescriber {
                calls: Mutex::new(Vec::new()),
                fail,
            }
        }

        fn calls(&self) -> Vec<Option<String>> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl TableDescriber for RecordingDescriber {
        type Output = String;

        fn describe(
            &self,
            table_name: Option<String>,
        ) -> impl Future<Output = Result<String, Error>> + Send {
            self.calls.lock().unwrap().push(table_name.clone());
            let fail = self.fail;
            async move {
                if fail {
                    Err(Error::from("ResourceNotFoundException: Requested resource not found"))
                } else {
                    Ok(format!("Table {:?} ACTIVE", table_name))
                }
            }
        }
    }

    fn env(table: Option<&'static str>) -> impl Fn(&str) -> Option<String> {
        move |key| match (key, table) {
            (TABLE_NAME_VAR, Some(table)) => Some(table.to_owned()),
            _ => None,
        }
    }

    #[tokio::test]
    async fn describes_the_configured_table_once() {
        let client = RecordingDescriber::new(false);

        let response = handler(&client, table_name_from(env(Some("orders"))))
            .await
            .unwrap();

        assert_eq!(client.calls(), vec![Some("orders".to_owned())]);
        assert_eq!(response, "Table Some(\"orders\") ACTIVE");
    }

    #[tokio::test]
    async fn unset_table_name_is_sent_absent() {
        let client = RecordingDescriber::new(false);

        handler(&client, table_name_from(env(None))).await.unwrap();

        assert_eq!(client.calls(), vec![None]);
    }

    #[tokio::test]
    async fn service_errors_propagate_without_retry() {
        let client = RecordingDescriber::new(true);

        let err = handler(&client, Some("missing".to_owned())).await.unwrap_err();

        assert!(err.to_string().contains("ResourceNotFoundException"));
        assert_eq!(client.calls().len(), 1);
    }

    #[tokio::test]
    async fn one_call_per_invocation() {
        let client = RecordingDescriber::new(false);

        for _ in 0..3 {
            handler(&client, Some("orders".to_owned())).await.unwrap();
        }

        assert_eq!(client.calls().len(), 3);
    }
}
