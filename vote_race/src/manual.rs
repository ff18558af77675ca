/*!

This is the long-form manual for `vote_race` and `voterace`.

## Input formats

The following formats are supported:
* `json` the vote table served by the vote tracking backend
* `xlsx` a vote matrix in an Excel spreadsheet

### `json`

```text
{
  "vote_rounds": ["Round 1", "Round 2"],
  "votes_data": [
    {"character": "Anna", "series": "Series A", "votes": [120, null]},
    {"character": "Bob", "series": "Series B", "votes": ["80/15", 40]}
  ],
  "participating_counts": {"Round 2": 1}
}
```

The `votes` of a row are aligned with `vote_rounds`. A `null` means that the
entity did not take part in the round: it is not the same as `0`. When an entity
had votes before and has a `null` in a round, it is shown as eliminated.

`participating_counts` is optional.

### `xlsx`

One row per entity, one column per round. The first row is the header:

|      | 角色 | 作品     | Round 1 | Round 2 |
|------|------|----------|---------|---------|
|      | Anna | Series A | 120     |         |
|      | Bob  | Series B | 80/15   | 40      |

The name column is `角色` (or `character`), the group column is `作品` (or `series`).
Every other column with a name is a round, in the order of the sheet. The first
worksheet is read unless `--excel-worksheet-name` or `excelWorksheetName` is set.

Cells are read as follows, for both formats:
 - empty cells: no vote
 - numbers: as is (rounded to two decimals, then to the closest integer by the engine)
 - text: trimmed, then read as a number. `80/15` is read as the sum `95`.
 - `inf`, `nan` and negative numbers: no vote

Whitespace in round names is ignored: `Round 1` and `Round1` are the same round.

## Configuration

`voterace` comes with sensible defaults. The season configuration is a JSON file
with the following keys, all optional:

- `rounds` (array): the rounds to play, in order. Each round has a `name` and the
  optional `startTime` (string), `totalVoters` (number) and `participatingCount`
  (number). Without this key, all the rounds of the input are played.

- `stats` (array): the lines of the statistics panel. Each line has an `id`, a
  `type` (`text` or `top-title`) and a `template`. Placeholders are written between
  braces: `totalVotes`, `totalVoters`, `averageVotes`, `medianVotes`, `percentage`,
  `actualParticipatingCount`, `startTime`, `topCount` and `tieSuffix`. A `top-title`
  line is followed by one line per leader of the round.

- `stageColors` (array of `{pattern, color}`): the color of the round title. The
  first pattern matching the round name wins. Patterns are regular expressions,
  matched anywhere in the name unless anchored: `第.阶段`, `^(Final|Semi)`. An
  invalid pattern is rejected when the configuration is read.

- `colors` (`{safe, default}`): the palette of the bars.

- `milestones` (object): for each round name, the list of `{character, text}`
  callouts, in display order.

- `roster` (array of `{character, series, avatar, rank}`): display information. The
  `rank` is the final rank, shown as a badge for the first 16.

- `layout`: `maxDisplay` (number of bars, default 50) and `milestone.maxVisiblePerGroup`
  (default 3), `milestone.margin`.

- `animation`: durations in milliseconds, `duration` (500), `delayFactor` (50),
  `buffer` (200), `roundDelay` (5000), `milestoneEnter` (1600), `milestoneExit`
  (1000), `milestoneMinDwell` (500), and `countdownFps` (120).

- `excludedRounds` (array of round names): rounds left out of the playback.

- `wildcardRounds` (array of round names) and `excludeWildcard` (boolean): with
  `excludeWildcard`, the wildcard rounds are left out too.

- `eliminatedCharacters` (object): for each round name, the list of
  `{character, series}` eliminated at the end of that round. It gives the number of
  participants of every round, computed over all the rounds, including the ones left
  out. A `participatingCount` given for the round wins.

- `excludeRanking` (boolean): the votes received from the elimination round on do
  not count. In a knockout round (its name contains `knockoutMarker`, `淘汰赛` by
  default), the votes of the elimination round itself still count.

The command line can add to the selection with `--exclude-round NAME` (repeatable),
`--exclude-wildcard` and `--exclude-ranking`.

- `tieSuffix` (string): appended to the `top-title` line when the leaders contain ties.

## Timing

A round lasts `duration + (bars - 1) * delayFactor + buffer + roundDelay`, where `bars`
is the number of bars on screen. The milestones of a round are shown in groups spread
evenly over the round. A group stays at least `milestoneMinDwell` on screen, and
leaves it `milestoneExit` before the next one appears. Before another round, the last
group is gone when the round ends; the groups that do not fit are shown at the start
of the next round. The last round shows all of its groups, even past the end of the
round, and its last group stays on screen.

 */
