//! The `/players` slash command: registration payload and option parsing.

use serenity::all::{
    CommandOptionType, CreateCommand, CreateCommandOption, Permissions, ResolvedOption,
    ResolvedValue,
};

/// Top-level slash command.
pub const PLAYERS_COMMAND: &str = "players";
/// Posts the leaderboard.
pub const RANK_SUBCOMMAND: &str = "rank";
/// Refreshes the roster from the ladder.
pub const UPDATE_SUBCOMMAND: &str = "update";
/// List disabled members too.
pub const INCLUDE_BANNED_OPTION: &str = "include_banned";
/// Ignore the staleness window.
pub const FORCE_UPDATE_OPTION: &str = "force_update";
/// Also refresh win/loss totals.
pub const INCLUDE_WIN_LOSS_OPTION: &str = "include_win_loss";

/// Parsed `/players` invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayersCommand {
    /// `/players rank`.
    Rank {
        /// List disabled members too.
        include_banned: bool,
    },
    /// `/players update`.
    Update {
        /// Refresh members updated inside the staleness window.
        force_update: bool,
        /// Refresh win/loss totals as well.
        include_win_loss: bool,
    },
}

impl PlayersCommand {
    /// Parse a sub-command name and its boolean flags.
    ///
    /// A missing `include_banned` is `false`; a bare `update` forces a full
    /// refresh including win/loss records.
    pub fn parse(subcommand: &str, flags: &[(&str, bool)]) -> Option<Self> {
        let flag = |name: &str, default: bool| {
            flags
                .iter()
                .find(|(option, _)| *option == name)
                .map_or(default, |(_, value)| *value)
        };
        match subcommand {
            RANK_SUBCOMMAND => Some(Self::Rank {
                include_banned: flag(INCLUDE_BANNED_OPTION, false),
            }),
            UPDATE_SUBCOMMAND => Some(Self::Update {
                force_update: flag(FORCE_UPDATE_OPTION, true),
                include_win_loss: flag(INCLUDE_WIN_LOSS_OPTION, true),
            }),
            _ => None,
        }
    }

    /// Parse the resolved options of an incoming interaction.
    pub fn from_options(options: &[ResolvedOption<'_>]) -> Option<Self> {
        options.iter().find_map(|option| match &option.value {
            ResolvedValue::SubCommand(inner) => {
                let flags = inner
                    .iter()
                    .filter_map(|flag| match flag.value {
                        ResolvedValue::Boolean(value) => Some((flag.name, value)),
                        _ => None,
                    })
                    .collect::<Vec<_>>();
                Self::parse(option.name, &flags)
            }
            _ => None,
        })
    }
}

fn flag_option(name: &str, description: &str) -> CreateCommandOption {
    CreateCommandOption::new(CommandOptionType::Boolean, name, description).required(false)
}

/// Registration payload for `/players`, restricted to administrators.
pub fn players_command() -> CreateCommand {
    CreateCommand::new(PLAYERS_COMMAND)
        .description("Community roster tools")
        .default_member_permissions(Permissions::ADMINISTRATOR)
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::SubCommand,
                RANK_SUBCOMMAND,
                "Post the community ranking",
            )
            .add_sub_option(flag_option(
                INCLUDE_BANNED_OPTION,
                "Also list disabled members",
            )),
        )
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::SubCommand,
                UPDATE_SUBCOMMAND,
                "Refresh ladder data for stale members",
            )
            .add_sub_option(flag_option(
                FORCE_UPDATE_OPTION,
                "Ignore the staleness threshold (default: true)",
            ))
            .add_sub_option(flag_option(
                INCLUDE_WIN_LOSS_OPTION,
                "Also fetch win/loss records (default: true)",
            )),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_subcommands_with_default_flags() {
        assert_eq!(
            PlayersCommand::parse("rank", &[]),
            Some(PlayersCommand::Rank {
                include_banned: false
            })
        );
        assert_eq!(
            PlayersCommand::parse("update", &[]),
            Some(PlayersCommand::Update {
                force_update: true,
                include_win_loss: true
            })
        );
        assert_eq!(
            PlayersCommand::parse("update", &[("force_update", false)]),
            Some(PlayersCommand::Update {
                force_update: false,
                include_win_loss: true
            })
        );
        assert_eq!(PlayersCommand::parse("kick", &[]), None);
    }
}
