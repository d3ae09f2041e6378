//! `group/*` commands.

use crate::connection::Connection;
use crate::error::ClientError;
use crate::player::{check_level, check_step};
use crate::types::{decode, GroupChange, GroupInfo};
use heos_protocol::{Command, Query, OFF, ON};

fn gid(group: i64) -> Query {
    Query::new().with("gid", group)
}

pub async fn get_groups(connection: &Connection) -> Result<Vec<GroupInfo>, ClientError> {
    decode(connection.send(Command::GetGroups, Query::new()).await?)
}

pub async fn get_group_info(connection: &Connection, group: i64) -> Result<GroupInfo, ClientError> {
    decode(connection.send(Command::GetGroupInfo, gid(group)).await?)
}

/// Groups `members` under `leader`, or changes an existing group's members.
///
/// Returns the resulting group, or `None` when the device dissolved it.
pub async fn set_group(
    connection: &Connection,
    leader: i64,
    members: &[i64],
) -> Result<Option<GroupChange>, ClientError> {
    let mut pids = Vec::with_capacity(members.len() + 1);
    pids.push(leader);
    pids.extend(members.iter().copied().filter(|&pid| pid != leader));

    let value = connection
        .send(Command::SetGroup, Query::new().with("pid", pids))
        .await?;
    if value.is_null() {
        return Ok(None);
    }
    decode(value).map(Some)
}

/// Dissolves a group by sending its leader alone.
///
/// The group id equals the leader's player id.
pub async fn ungroup(connection: &Connection, group: i64) -> Result<(), ClientError> {
    connection
        .send(Command::SetGroup, Query::new().with("pid", group))
        .await?;
    Ok(())
}

pub async fn get_volume(connection: &Connection, group: i64) -> Result<i64, ClientError> {
    decode(connection.send(Command::GetGroupVolume, gid(group)).await?)
}

pub async fn set_volume(connection: &Connection, group: i64, level: u8) -> Result<(), ClientError> {
    check_level(level)?;
    let query = gid(group).with("level", level);
    connection.send(Command::SetGroupVolume, query).await?;
    Ok(())
}

pub async fn volume_up(connection: &Connection, group: i64, step: u8) -> Result<(), ClientError> {
    check_step(step)?;
    let query = gid(group).with("step", step);
    connection.send(Command::GroupVolumeUp, query).await?;
    Ok(())
}

pub async fn volume_down(connection: &Connection, group: i64, step: u8) -> Result<(), ClientError> {
    check_step(step)?;
    let query = gid(group).with("step", step);
    connection.send(Command::GroupVolumeDown, query).await?;
    Ok(())
}

pub async fn get_mute(connection: &Connection, group: i64) -> Result<bool, ClientError> {
    decode(connection.send(Command::GetGroupMute, gid(group)).await?)
}

pub async fn set_mute(connection: &Connection, group: i64, mute: bool) -> Result<(), ClientError> {
    let query = gid(group).with("state", if mute { ON } else { OFF });
    connection.send(Command::SetGroupMute, query).await?;
    Ok(())
}

pub async fn toggle_mute(connection: &Connection, group: i64) -> Result<(), ClientError> {
    connection.send(Command::ToggleGroupMute, gid(group)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::connected;
    use serde_json::json;

    #[tokio::test]
    async fn test_set_group_leader_first() {
        let (connection, mut device, _) = connected().await;

        let (result, _) = tokio::join!(set_group(&connection, 1, &[2, 1, 3]), async {
            let request = device.command.read_request().await;
            assert_eq!(request.query.to_string(), "pid=1,2,3");
            device
                .command
                .respond(Command::SetGroup, "gid=1&name=Kitchen + Den + Patio&pid=1,2,3")
                .await;
        });

        let change = result.unwrap().unwrap();
        assert_eq!(change.gid, 1);
        assert_eq!(change.name, "Kitchen + Den + Patio");
        assert_eq!(change.pid, vec![1, 2, 3]);

        connection.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_ungroup() {
        let (connection, mut device, _) = connected().await;

        let (result, _) = tokio::join!(ungroup(&connection, 7), async {
            let request = device.command.read_request().await;
            assert_eq!(request.command, Command::SetGroup);
            assert_eq!(request.query.to_string(), "pid=7");
            device.command.respond(Command::SetGroup, "pid=7").await;
        });
        result.unwrap();

        connection.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_get_groups() {
        let (connection, mut device, _) = connected().await;

        let (groups, _) = tokio::join!(get_groups(&connection), async {
            device.command.read_request().await;
            device
                .command
                .respond_with_payload(
                    Command::GetGroups,
                    "",
                    json!([{"name": "G", "gid": 1, "players": [
                        {"name": "A", "pid": 1, "role": "leader"},
                        {"name": "B", "pid": 2, "role": "member"}
                    ]}]),
                )
                .await;
        });
        let groups = groups.unwrap();
        assert_eq!(groups[0].players.len(), 2);

        connection.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_group_volume() {
        let (connection, mut device, _) = connected().await;

        let (level, _) = tokio::join!(get_volume(&connection, 1), async {
            device.command.read_request().await;
            device
                .command
                .respond(Command::GetGroupVolume, "gid=1&level=15")
                .await;
        });
        assert_eq!(level.unwrap(), 15);

        let (result, request) = tokio::join!(
            volume_down(&connection, 1, 2),
            device.command.ack(Command::GroupVolumeDown)
        );
        result.unwrap();
        assert_eq!(request.query.to_string(), "gid=1&step=2");

        assert!(matches!(
            set_volume(&connection, 1, 120).await,
            Err(ClientError::Validation(_))
        ));

        connection.close().await.unwrap();
    }
}
