//! `system/*` commands.

use crate::connection::{Channel, Connection};
use crate::error::ClientError;
use heos_protocol::{Command, Query, OFF, ON};

/// Turns change events on or off.
///
/// The acknowledgement arrives on the event channel, so the command is sent
/// there as well.
pub async fn register_for_change_events(
    connection: &Connection,
    enable: bool,
) -> Result<(), ClientError> {
    let query = Query::new().with("enable", if enable { ON } else { OFF });
    connection
        .send_on(Channel::Event, Command::RegisterForChangeEvents, query)
        .await?;
    Ok(())
}

/// Returns the signed-in account name, or `None` when signed out.
pub async fn check_account(connection: &Connection) -> Result<Option<String>, ClientError> {
    let value = connection.send(Command::CheckAccount, Query::new()).await?;
    Ok(value.as_str().map(str::to_string))
}

pub async fn sign_in(
    connection: &Connection,
    username: &str,
    password: &str,
) -> Result<(), ClientError> {
    if username.is_empty() {
        return Err(ClientError::validation("username must not be empty"));
    }
    let query = Query::new().with("un", username).with("pw", password);
    connection.send(Command::SignIn, query).await?;
    Ok(())
}

pub async fn sign_out(connection: &Connection) -> Result<(), ClientError> {
    connection.send(Command::SignOut, Query::new()).await?;
    Ok(())
}

pub async fn heart_beat(connection: &Connection) -> Result<(), ClientError> {
    connection.send(Command::HeartBeat, Query::new()).await?;
    Ok(())
}

pub async fn reboot(connection: &Connection) -> Result<(), ClientError> {
    connection.send(Command::Reboot, Query::new()).await?;
    Ok(())
}

/// Asks the device to pretty-print its JSON responses.
pub async fn prettify_json_response(
    connection: &Connection,
    enable: bool,
) -> Result<(), ClientError> {
    let query = Query::new().with("enable", if enable { ON } else { OFF });
    connection.send(Command::PrettifyJsonResponse, query).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::connected;
    use heos_protocol::QueryValue;

    #[tokio::test]
    async fn test_register_for_change_events_uses_event_channel() {
        let (connection, mut device, _) = connected().await;

        let (result, request) = tokio::join!(
            register_for_change_events(&connection, true),
            device.event.ack(Command::RegisterForChangeEvents)
        );
        result.unwrap();
        assert_eq!(
            request.query.get("enable"),
            Some(&QueryValue::Text("on".to_string()))
        );
        device
            .command
            .expect_silence(std::time::Duration::from_millis(50))
            .await;

        connection.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_check_account() {
        let (connection, mut device, _) = connected().await;

        let (result, _) = tokio::join!(check_account(&connection), async {
            device.command.read_request().await;
            device
                .command
                .respond(Command::CheckAccount, "signed_in&un=user@example.com")
                .await;
        });
        assert_eq!(result.unwrap().as_deref(), Some("user@example.com"));

        let (result, _) = tokio::join!(check_account(&connection), async {
            device.command.read_request().await;
            device
                .command
                .respond(Command::CheckAccount, "signed_out")
                .await;
        });
        assert_eq!(result.unwrap(), None);

        connection.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_sign_in_query() {
        let (connection, mut device, _) = connected().await;

        let (result, request) = tokio::join!(
            sign_in(&connection, "user@example.com", "secret"),
            device.command.ack(Command::SignIn)
        );
        result.unwrap();
        assert_eq!(request.query.to_string(), "un=user@example.com&pw=secret");

        let err = sign_in(&connection, "", "secret").await.unwrap_err();
        assert!(matches!(err, ClientError::Validation(_)));

        connection.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_heart_beat() {
        let (connection, mut device, _) = connected().await;

        let (result, request) = tokio::join!(
            heart_beat(&connection),
            device.command.ack(Command::HeartBeat)
        );
        result.unwrap();
        assert!(request.query.is_empty());

        connection.close().await.unwrap();
    }
}
