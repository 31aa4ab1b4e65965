/*!

This is the long-form manual for `anomaly_scoring` and `electanom`.

## What is computed

For a jurisdiction and an election, the vote counts of every reporting unit beneath
the jurisdiction are rolled up to the requested level (for example all the precincts,
or all the counties) and split into *analysis units*: one per contest, reporting unit
type and vote category. Within an analysis unit, every reporting unit is compared to
its peers:

1. Only the two strongest selections are kept. The ranking uses the `total` vote
   category over the whole contest and reporting unit type.
2. Reporting units with 100 votes or fewer are dropped. At least 5 reporting units
   must remain.
3. Each reporting unit gets the sum of the Euclidean distances between its vote
   shares and the vote shares of all the other units. The score is the z-score of
   this sum.
4. The two most extreme rows are compared with the next two rows on the same side
   of the distribution. The *votes at stake* is the number of votes that would have
   to move for the extreme rows to have the split of their neighbours.

The analysis units with the 3 largest distinct votes-at-stake values are reported,
along with up to 8 of their reporting units.

The score is a heuristic, not a statistical test. A high score is a reason to look
at the results of a reporting unit, not evidence that something went wrong.

## Votes at stake

The estimate is one of:

- `computed`: a number of votes, possibly 0 when all the splits are the same.
- `insufficientData`: two scored rows or fewer.
- `computationFailed`: the estimate could not be computed, for example because the
  neighbouring rows have no votes. A warning is logged.

The last two are reported with a value of 0, but keep their status in the output.

## Input formats

The following formats are supported for vote counts:
* `csv` Comma Separated Values
* `xlsx` Excel spreadsheet
* `json` a complete snapshot of reporting units and vote counts

### `csv`

The reporting units are described in their own file, the root has no parent:

```text
id,name,type,parent
1,Georgia,state,
2,Fulton,county,1
3,Fulton;P1,precinct,2
```

The vote counts have one row per reporting unit, contest, selection and vote category:

```text
reporting_unit,contest_id,contest,candidate_id,selection,count_item_type,count
3,10,Governor,100,Anna,total,1203
3,10,Governor,101,Bob,total,874
```

Types that are not part of the NIST common data format (`state`, `county`,
`precinct`, `ward`, ...) are kept as free text and only match the exact same text.

### `xlsx`

The same columns as the `csv` vote counts, with the header in the first row. The
worksheet is chosen with `excelWorksheetName`. Without it, the workbook must have a
single worksheet.

### `json`

```text
{
  "election": "2020 General",
  "reportingUnits": [ {"id": 1, "name": "Georgia", "type": "state"} ],
  "voteCounts": [
    {"reportingUnit": 3, "contestId": 10, "contest": "Governor", "candidateId": 100,
     "selection": "Anna", "countItemType": "total", "count": 1203}
  ]
}
```

## Configuration

`electanom` comes with sensible defaults. The configuration file is in JSON:

```text
{
  "outputSettings": {
    "electionName": "2020 General",
    "jurisdiction": 1,
    "subdivisionType": "county",
    "contest": 10,
    "outputFile": "summary.json"
  },
  "reportingUnitsFile": "units.csv",
  "voteCountSources": [ {"provider": "csv", "filePath": "counts.csv"} ],
  "rules": { "noiseFloor": 100, "minReportingUnits": 5, "topN": 3, "displayCap": 8, "marginDivisor": 1.0 },
  "fetchTimeoutSeconds": 30
}
```

Paths are relative to the configuration file. All the `rules` are optional.
The command line flags `--jurisdiction`, `--subdivision-type`, `--contest`, `--top-n`,
`--timeout` and `--out` override the corresponding values. `--input` replaces the
input files with a single JSON snapshot.

The votes at stake are divided by `marginDivisor`. How to normalise them by the margin
of the contest is still open, so it defaults to 1.

The default thresholds (noise floor of 100 votes, 5 reporting units, top 3, 8
reporting units shown) have not been reviewed by a statistician.

 */
