use clap::Parser;

/// This program plays the cumulative votes of a contest as a bar race, one round at a time.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path, optional) The season configuration in JSON: rounds, statistics templates,
    /// colors, milestones and layout. For more information about the file format, read the
    /// documentation of the vote_race::manual module.
    #[clap(short, long, value_parser)]
    pub config: Option<String>,

    /// (file path) The vote table.
    #[clap(short, long, value_parser)]
    pub input: String,

    /// (json or xlsx) The type of the input. Guessed from the file extension if not provided.
    #[clap(long, value_parser)]
    pub input_type: Option<String>,

    /// When using an Excel file, indicates the name of the worksheet to use. The first
    /// worksheet is used by default.
    #[clap(long, value_parser)]
    pub excel_worksheet_name: Option<String>,

    /// (file path, 'stdout' or empty) If specified, the summary of the race will be written in
    /// JSON format to the given location. Defaults to the standard output.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// (file path) A reference summary in JSON format. If provided, voterace will
    /// check that the computed summary matches the reference.
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,

    /// (round name, repeatable) Leaves the round out of the playback, on top of the
    /// excludedRounds of the configuration.
    #[clap(long, value_parser)]
    pub exclude_round: Vec<String>,

    /// Leaves the wildcard rounds of the configuration out of the playback.
    #[clap(long, takes_value = false)]
    pub exclude_wildcard: bool,

    /// Ignores the votes an entity receives from the round it is eliminated in.
    #[clap(long, takes_value = false)]
    pub exclude_ranking: bool,

    /// Replays the race without waiting between the rounds.
    #[clap(long, takes_value = false)]
    pub instant: bool,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
